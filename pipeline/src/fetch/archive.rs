//! Export archive extraction.

use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::error::{FetchError, FetchResult};

/// Extract every file entry of a zip archive into `output_dir`, replacing
/// existing files. Entries escaping the directory are rejected.
pub fn extract_archive(bytes: &[u8], output_dir: &Path) -> FetchResult<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    fs::create_dir_all(output_dir)?;

    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| FetchError::Archive(format!("unsafe entry name '{}'", entry.name())))?;
        let target = output_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        written.push(target);
    }

    Ok(written)
}

/// Extract the archive and return the path of its CSV entry.
pub fn extract_csv(bytes: &[u8], output_dir: &Path) -> FetchResult<PathBuf> {
    extract_archive(bytes, output_dir)?
        .into_iter()
        .find(|p| {
            p.extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .ok_or_else(|| FetchError::Archive("archive contains no CSV file".to_string()))
}
