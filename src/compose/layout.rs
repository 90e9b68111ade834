use crate::settings::{ComposeSettings, Overflow};

use super::font::{FontMetrics, measure_text_width_px};

const ELLIPSIS: char = '…';
const HYPHEN: char = '-';
const SIZE_STEP: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FitParams {
    pub max_font_size: f32,
    pub min_font_size: f32,
    pub line_height: f32,
    pub width_ratio: f32,
    pub height_ratio: f32,
    pub overflow: Overflow,
}

impl From<&ComposeSettings> for FitParams {
    fn from(settings: &ComposeSettings) -> Self {
        Self {
            max_font_size: settings.max_font_size,
            min_font_size: settings.min_font_size,
            line_height: settings.line_height,
            width_ratio: settings.width_ratio,
            height_ratio: settings.height_ratio,
            overflow: settings.overflow,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub font_size: f32,
    /// Distance between baselines in pixels.
    pub line_height: f32,
    pub lines: Vec<String>,
    pub truncated: bool,
}

impl TextLayout {
    pub fn block_height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height
    }
}

/// Finds the largest font size whose wrapped text fits a `width` x `height`
/// box. `None` when nothing fits under the overflow policy.
pub fn fit_text(
    text: &str,
    width: u32,
    height: u32,
    params: &FitParams,
    font: Option<&FontMetrics>,
) -> Option<TextLayout> {
    let max_w = width as f32 * params.width_ratio;
    let max_h = height as f32 * params.height_ratio;
    let text = text.trim();

    if text.is_empty() {
        return Some(TextLayout {
            font_size: params.max_font_size,
            line_height: params.max_font_size * params.line_height,
            lines: Vec::new(),
            truncated: false,
        });
    }

    let mut size = params.max_font_size;
    loop {
        let line_height = size * params.line_height;
        if let Some(lines) = wrap_words(text, size, max_w, font) {
            if lines.len() as f32 * line_height <= max_h {
                return Some(TextLayout {
                    font_size: size,
                    line_height,
                    lines,
                    truncated: false,
                });
            }
        }
        if size <= params.min_font_size {
            break;
        }
        size = (size - SIZE_STEP).max(params.min_font_size);
    }

    match params.overflow {
        Overflow::Fail => None,
        Overflow::Truncate => truncate_to_fit(text, params.min_font_size, max_w, max_h, params, font),
    }
}

fn truncate_to_fit(
    text: &str,
    size: f32,
    max_w: f32,
    max_h: f32,
    params: &FitParams,
    font: Option<&FontMetrics>,
) -> Option<TextLayout> {
    let line_height = size * params.line_height;
    let max_lines = (max_h / line_height).floor() as usize;
    if max_lines == 0 {
        return None;
    }
    let mut lines = wrap_words(text, size, max_w, font)?;
    lines.truncate(max_lines);
    let last = lines.pop()?;

    let mut kept = last.trim_end_matches(HYPHEN).to_string();
    loop {
        let candidate = format!("{}{}", kept.trim_end(), ELLIPSIS);
        if measure_text_width_px(&candidate, size, font) <= max_w {
            lines.push(candidate);
            break;
        }
        if kept.pop().is_none() {
            return None;
        }
    }

    Some(TextLayout {
        font_size: size,
        line_height,
        lines,
        truncated: true,
    })
}

/// Greedy word wrap by measured width. Words wider than a line are
/// hyphenated; when even a hyphen does not fit the word is split bare.
/// `None` when a single character is wider than the line.
fn wrap_words(text: &str, size: f32, max_w: f32, font: Option<&FontMetrics>) -> Option<Vec<String>> {
    let fits = |value: &str| measure_text_width_px(value, size, font) <= max_w;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if fits(word) {
            current = word.to_string();
            continue;
        }

        let mut rest = word.chars().collect::<Vec<_>>();
        while !rest.is_empty() {
            let whole = rest.iter().collect::<String>();
            if fits(&whole) {
                current = whole;
                break;
            }
            let hyphenated = (1..rest.len()).rev().find(|&len| {
                let mut prefix = rest[..len].iter().collect::<String>();
                prefix.push(HYPHEN);
                fits(&prefix)
            });
            let taken = match hyphenated {
                Some(len) => {
                    let mut prefix = rest[..len].iter().collect::<String>();
                    prefix.push(HYPHEN);
                    lines.push(prefix);
                    len
                }
                None => {
                    let len = (1..rest.len())
                        .rev()
                        .find(|&len| fits(&rest[..len].iter().collect::<String>()))?;
                    lines.push(rest[..len].iter().collect());
                    len
                }
            };
            rest.drain(..taken);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    Some(lines)
}
