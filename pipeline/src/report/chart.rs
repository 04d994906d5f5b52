//! Horizontal bar chart of skill ratings.
//!
//! One row per skill. With both sides present the evaluator's bar is drawn
//! wide in scarlet with the participant's narrower black bar on top, and
//! the gap is labelled on the right (`+2 Supervisor`).

use super::pdf::{text_width, Color, Font, PdfWriter, MARGIN, PAGE_WIDTH};

const ROW_HEIGHT: f32 = 16.0;
const LABEL_WIDTH: f32 = 110.0;
const DIFF_WIDTH: f32 = 100.0;
const WIDE_BAR: f32 = 11.0;
const NARROW_BAR: f32 = 6.0;
const FONT_SIZE: f32 = 8.0;

/// Ratings of one skill. `None` means unanswered and draws no bar.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillBar {
    pub label: String,
    pub participant: Option<f64>,
    pub evaluator: Option<f64>,
}

impl SkillBar {
    /// Evaluator minus participant, when both answered.
    pub fn difference(&self) -> Option<f64> {
        Some(self.evaluator? - self.participant?)
    }
}

/// Format a rating without a trailing `.0`.
pub fn format_score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

/// Label for the gap between the two ratings, naming whoever rated higher.
/// Blank when they agree.
pub fn difference_label(difference: f64, participant_label: &str, evaluator_label: &str) -> String {
    let amount = format_score(difference.abs());
    if difference > 0.0 {
        format!("+{} {}", amount, evaluator_label)
    } else if difference < 0.0 {
        format!("+{} {}", amount, participant_label)
    } else {
        String::new()
    }
}

/// Chart for one report.
#[derive(Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub bars: Vec<SkillBar>,
    /// Top of the rating scale.
    pub max: f64,
    pub participant_label: String,
    pub evaluator_label: String,
}

impl BarChart {
    fn plot_x() -> f32 {
        MARGIN + LABEL_WIDTH
    }

    fn plot_width() -> f32 {
        PAGE_WIDTH - 2.0 * MARGIN - LABEL_WIDTH - DIFF_WIDTH
    }

    fn has_both_sides(&self) -> bool {
        self.bars
            .iter()
            .any(|b| b.participant.is_some() && b.evaluator.is_some())
    }

    /// Length in points of a bar for `value`, clamped to the plot.
    pub fn bar_length(&self, value: f64) -> f32 {
        if self.max <= 0.0 {
            return 0.0;
        }
        ((value / self.max).clamp(0.0, 1.0) as f32) * Self::plot_width()
    }

    fn legend(&self) -> Vec<(Color, String)> {
        let participant = (
            Color::BLACK,
            format!("{} Rating", self.participant_label),
        );
        let evaluator = (Color::SCARLET, format!("{} Rating", self.evaluator_label));
        let any_participant = self.bars.iter().any(|b| b.participant.is_some());
        let any_evaluator = self.bars.iter().any(|b| b.evaluator.is_some());
        match (any_participant, any_evaluator) {
            (true, true) => vec![evaluator, participant],
            (true, false) => vec![(Color::SCARLET, participant.1)],
            _ => vec![evaluator],
        }
    }

    /// Draw the title, legend, one row per skill and the score axis,
    /// breaking pages between rows.
    pub fn draw(&self, pdf: &mut PdfWriter) {
        pdf.line(MARGIN, Font::Bold, 12.0, &self.title);

        pdf.ensure_space(ROW_HEIGHT);
        pdf.advance(ROW_HEIGHT);
        let mut x = Self::plot_x();
        for (color, label) in self.legend() {
            let y = pdf.cursor();
            pdf.fill_rect(x, y, 10.0, 8.0, color);
            pdf.text(x + 14.0, y, Font::Regular, FONT_SIZE, &label);
            x += 14.0 + text_width(&label, Font::Regular, FONT_SIZE) + 20.0;
        }

        let both = self.has_both_sides();
        for bar in &self.bars {
            pdf.ensure_space(ROW_HEIGHT);
            pdf.advance(ROW_HEIGHT);
            let row_y = pdf.cursor();
            pdf.text(MARGIN, row_y, Font::Regular, FONT_SIZE, &bar.label);

            let centre = row_y + FONT_SIZE / 3.0;
            if both {
                if let Some(v) = bar.evaluator {
                    pdf.fill_rect(Self::plot_x(), centre - WIDE_BAR / 2.0, self.bar_length(v), WIDE_BAR, Color::SCARLET);
                }
                if let Some(v) = bar.participant {
                    pdf.fill_rect(Self::plot_x(), centre - NARROW_BAR / 2.0, self.bar_length(v), NARROW_BAR, Color::BLACK);
                }
                if let Some(diff) = bar.difference() {
                    let label = difference_label(diff, &self.participant_label, &self.evaluator_label);
                    if !label.is_empty() {
                        let x = Self::plot_x() + Self::plot_width() + 8.0;
                        pdf.text(x, row_y, Font::Regular, FONT_SIZE, &label);
                    }
                }
            } else if let Some(v) = bar.participant.or(bar.evaluator) {
                pdf.fill_rect(Self::plot_x(), centre - NARROW_BAR / 2.0, self.bar_length(v), NARROW_BAR, Color::SCARLET);
            }
        }

        self.draw_axis(pdf);
    }

    fn draw_axis(&self, pdf: &mut PdfWriter) {
        pdf.ensure_space(2.0 * ROW_HEIGHT);
        pdf.advance(ROW_HEIGHT / 2.0);
        let y = pdf.cursor();
        pdf.fill_rect(Self::plot_x(), y, Self::plot_width(), 0.5, Color::BLACK);

        pdf.advance(ROW_HEIGHT / 2.0 + 2.0);
        let tick_y = pdf.cursor();
        let ticks = self.max.floor().max(0.0) as i64;
        for tick in 0..=ticks {
            let x = Self::plot_x() + self.bar_length(tick as f64) - 2.0;
            pdf.fill_rect(x + 2.0, y - 3.0, 0.5, 3.0, Color::BLACK);
            pdf.text(x, tick_y, Font::Regular, FONT_SIZE, &tick.to_string());
        }
        pdf.line(Self::plot_x() + Self::plot_width() / 2.0 - 10.0, Font::Regular, FONT_SIZE, "Score");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(p: Option<f64>, e: Option<f64>) -> SkillBar {
        SkillBar {
            label: "Skill 1".into(),
            participant: p,
            evaluator: e,
        }
    }

    fn chart(bars: Vec<SkillBar>) -> BarChart {
        BarChart {
            title: "Comparison".into(),
            bars,
            max: 7.0,
            participant_label: "Student".into(),
            evaluator_label: "Supervisor".into(),
        }
    }

    #[test]
    fn test_difference_labels() {
        assert_eq!(difference_label(2.0, "Student", "Supervisor"), "+2 Supervisor");
        assert_eq!(difference_label(-1.5, "Student", "Supervisor"), "+1.5 Student");
        assert_eq!(difference_label(0.0, "Student", "Supervisor"), "");
    }

    #[test]
    fn test_difference_needs_both_sides() {
        assert_eq!(bar(Some(3.0), Some(5.0)).difference(), Some(2.0));
        assert_eq!(bar(None, Some(5.0)).difference(), None);
    }

    #[test]
    fn test_bar_length_scales_and_clamps() {
        let c = chart(vec![]);
        let full = BarChart::plot_width();
        assert_eq!(c.bar_length(7.0), full);
        assert_eq!(c.bar_length(0.0), 0.0);
        assert!((c.bar_length(3.5) - full / 2.0).abs() < 0.01);
        assert_eq!(c.bar_length(9.0), full);
    }

    #[test]
    fn test_legend_follows_present_sides() {
        let both = chart(vec![bar(Some(1.0), Some(2.0))]).legend();
        assert_eq!(both.len(), 2);
        let only = chart(vec![bar(None, Some(2.0))]).legend();
        assert_eq!(only, vec![(Color::SCARLET, "Supervisor Rating".to_string())]);
    }

    #[test]
    fn test_draw_labels_rows_and_gaps() {
        let mut pdf = PdfWriter::new();
        chart(vec![bar(Some(3.0), Some(5.0))]).draw(&mut pdf);
        let text = super::super::pdf::extract_all_text(&pdf.to_bytes().unwrap());
        assert!(text.contains("Skill 1"));
        assert!(text.contains("+2 Supervisor"));
    }
}
