//! Minimal paginating PDF writer on top of `lopdf`.
//!
//! Pages are US letter. Text uses the standard Helvetica faces with
//! WinAnsi encoding, so no fonts are embedded; text outside WinAnsi is
//! transliterated by [`to_win_ansi`]. Coordinates are PDF points with the
//! origin at the bottom-left corner.

use encoding_rs::WINDOWS_1252;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::RenderResult;

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const MARGIN: f32 = 36.0;
/// Line height as a multiple of font size.
const LEADING: f32 = 1.3;

/// RGB fill colour, components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color(pub f32, pub f32, pub f32);

impl Color {
    pub const BLACK: Color = Color(0.0, 0.0, 0.0);
    /// #a6192e
    pub const SCARLET: Color = Color(0.651, 0.098, 0.180);
    pub const GRID: Color = Color(0.871, 0.886, 0.902);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    /// Average glyph width as a fraction of the font size.
    fn average_width(self) -> f32 {
        match self {
            Font::Regular => 0.5,
            Font::Bold => 0.55,
        }
    }
}

/// Approximate rendered width of `text`.
pub fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars().count() as f32 * size * font.average_width()
}

/// Greedy word wrap to `width` points. Explicit newlines are kept; a word
/// longer than a line gets a line of its own.
pub fn wrap_text(text: &str, font: Font, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", line, word)
            };
            if !line.is_empty() && text_width(&candidate, font, size) > width {
                lines.push(std::mem::replace(&mut line, word.to_string()));
            } else {
                line = candidate;
            }
        }
        lines.push(line);
    }
    lines
}

fn is_win_ansi(c: char) -> bool {
    let mut buf = [0u8; 4];
    let (_, _, unmappable) = WINDOWS_1252.encode(c.encode_utf8(&mut buf));
    !unmappable
}

/// Letters with no canonical decomposition onto a WinAnsi base.
fn substitute(c: char) -> Option<&'static str> {
    Some(match c {
        'Ł' | 'Ŀ' => "L",
        'ł' | 'ŀ' => "l",
        'Đ' => "D",
        'đ' => "d",
        'Ħ' => "H",
        'ħ' => "h",
        'ı' => "i",
        'Ŧ' => "T",
        'ŧ' => "t",
        'Ŋ' => "N",
        'ŋ' => "n",
        'ĸ' => "k",
        'Ə' => "E",
        'ə' => "e",
        '\u{2010}' | '\u{2011}' | '\u{2212}' => "-",
        _ => return None,
    })
}

/// Text restricted to what the WinAnsi fonts can show. Accented letters
/// outside the code page lose their marks (`Nguyễn` becomes `Nguyen`), a few
/// undecomposable letters are substituted (`Ł` becomes `L`) and anything
/// else becomes `?`.
pub fn to_win_ansi(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_win_ansi) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_win_ansi(c) {
            out.push(c);
            continue;
        }
        let base: String = std::iter::once(c)
            .nfkd()
            .filter(|d| !is_combining_mark(*d))
            .collect();
        if !base.is_empty() && base.chars().all(is_win_ansi) {
            out.push_str(&base);
        } else {
            out.push_str(substitute(c).unwrap_or("?"));
        }
    }
    Cow::Owned(out)
}

fn encode(text: &str) -> Vec<u8> {
    WINDOWS_1252.encode(&to_win_ansi(text)).0.into_owned()
}

/// Accumulates drawing operations page by page. A vertical cursor tracks
/// where flowing content goes next.
#[derive(Debug)]
pub struct PdfWriter {
    pages: Vec<Vec<Operation>>,
    cursor: f32,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        let mut writer = Self {
            pages: Vec::new(),
            cursor: 0.0,
        };
        writer.new_page();
        writer
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    /// Start a page with a thin border and reset the cursor to the top.
    pub fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor = PAGE_HEIGHT - MARGIN;
        self.stroke_rect(10.0, 10.0, PAGE_WIDTH - 20.0, PAGE_HEIGHT - 20.0, 0.3);
    }

    /// Break the page if fewer than `height` points remain. Returns whether
    /// a new page was started.
    pub fn ensure_space(&mut self, height: f32) -> bool {
        if self.cursor - height < MARGIN {
            self.new_page();
            true
        } else {
            false
        }
    }

    /// Move the cursor down.
    pub fn advance(&mut self, height: f32) {
        self.cursor -= height;
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Draw `text` with its baseline at (`x`, `y`).
    pub fn text(&mut self, x: f32, y: f32, font: Font, size: f32, text: &str) {
        let ops = self.ops();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("rg", vec![0.0f32.into(), 0.0f32.into(), 0.0f32.into()]));
        ops.push(Operation::new("Tf", vec![font.resource_name().into(), size.into()]));
        ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(encode(text))]));
        ops.push(Operation::new("ET", vec![]));
    }

    /// Write one line at `x` on the cursor and move below it.
    pub fn line(&mut self, x: f32, font: Font, size: f32, text: &str) {
        let height = size * LEADING;
        self.ensure_space(height);
        self.advance(height);
        let y = self.cursor;
        self.text(x, y, font, size, text);
    }

    /// Like [`PdfWriter::line`], horizontally centred on the page.
    pub fn centered_line(&mut self, font: Font, size: f32, text: &str) {
        let x = ((PAGE_WIDTH - text_width(text, font, size)) / 2.0).max(MARGIN);
        self.line(x, font, size, text);
    }

    /// Wrapped text flowing from the cursor, breaking pages as needed.
    pub fn paragraph(&mut self, x: f32, width: f32, font: Font, size: f32, text: &str) {
        for line in wrap_text(text, font, size, width) {
            self.line(x, font, size, &line);
        }
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        let ops = self.ops();
        ops.push(Operation::new("rg", vec![color.0.into(), color.1.into(), color.2.into()]));
        ops.push(Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]));
        ops.push(Operation::new("f", vec![]));
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, line_width: f32) {
        let ops = self.ops();
        ops.push(Operation::new("w", vec![line_width.into()]));
        ops.push(Operation::new("RG", vec![0.0f32.into(), 0.0f32.into(), 0.0f32.into()]));
        ops.push(Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]));
        ops.push(Operation::new("S", vec![]));
    }

    /// Serialize all pages into a PDF document.
    pub fn to_bytes(self) -> RenderResult<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular,
                "F2" => bold,
            },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for operations in self.pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Serialize and write to `path`, replacing any existing file.
    pub fn save(self, path: &Path) -> RenderResult<()> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// Text of every page, in page order.
#[cfg(test)]
pub(crate) fn extract_all_text(bytes: &[u8]) -> String {
    let doc = Document::load_mem(bytes).unwrap();
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&pages).unwrap()
}
