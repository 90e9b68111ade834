use crate::geometry::Rect;

use super::TextBox;

const WORD_LEVEL: i32 = 5;

/// Reads word rows from `tesseract ... tsv` output, keeping words whose
/// confidence is strictly above `min_conf`.
pub(super) fn parse_tsv_words(tsv: &str, min_conf: f32) -> Vec<TextBox> {
    let mut words = Vec::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].trim().parse().unwrap_or(0);
        if level != WORD_LEVEL {
            continue;
        }
        let left: u32 = cols[6].trim().parse().unwrap_or(0);
        let top: u32 = cols[7].trim().parse().unwrap_or(0);
        let width: u32 = cols[8].trim().parse().unwrap_or(0);
        let height: u32 = cols[9].trim().parse().unwrap_or(0);
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        let text = cols[11..].join("\t");
        let text = text.trim();
        if text.is_empty() || conf <= min_conf {
            continue;
        }

        words.push(TextBox {
            text: text.to_string(),
            bbox: Rect::new(left, top, width, height),
            conf,
        });
    }

    words
}
