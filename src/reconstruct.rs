//! Page fragments to reading-order paragraphs.
//!
//! ```text
//! fragments -> y buckets -> lines (top to bottom, left to right)
//!           -> cleaned lines -> paragraphs (hyphen-aware joins)
//! ```
//!
//! Pages are reconstructed independently and their paragraphs concatenated.

use crate::config::AppConfig;
use crate::extract::{Fragment, PageFragments};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, trace};

static RE_NEWLINE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\n\s*").expect("newline regex"));
static RE_MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("space regex"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextReconstructor {
    line_tolerance: f32,
    paragraph_gap_factor: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
struct Line {
    y: f32,
    text: String,
}

impl Default for TextReconstructor {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl TextReconstructor {
    pub fn new(line_tolerance: f32, paragraph_gap_factor: Option<f32>) -> Self {
        let line_tolerance = if line_tolerance.is_finite() && line_tolerance > 0.0 {
            line_tolerance
        } else {
            AppConfig::default().line_tolerance
        };
        Self {
            line_tolerance,
            paragraph_gap_factor: paragraph_gap_factor.filter(|f| f.is_finite() && *f > 1.0),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.line_tolerance, config.paragraph_gap_factor)
    }

    /// Paragraphs of every page, in page order.
    pub fn reconstruct(&self, pages: &[PageFragments]) -> Vec<String> {
        let mut paragraphs = Vec::new();
        for page in pages {
            let page_paragraphs = self.page_paragraphs(page);
            debug!(
                page = page.page,
                fragments = page.fragments.len(),
                paragraphs = page_paragraphs.len(),
                "Reconstructed page"
            );
            paragraphs.extend(page_paragraphs);
        }
        paragraphs
    }

    pub fn page_paragraphs(&self, page: &PageFragments) -> Vec<String> {
        let lines = self.group_lines(&page.fragments);
        let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
        let threshold = self.gap_threshold(&lines);

        for (idx, line) in lines.iter().enumerate() {
            if let (Some(threshold), Some(prev)) = (threshold, idx.checked_sub(1).map(|i| &lines[i]))
            {
                if prev.y - line.y > threshold {
                    trace!(page = page.page, y = line.y, "Paragraph break from vertical gap");
                    cleaned.push(String::new());
                }
            }
            cleaned.push(clean_line(&line.text));
        }

        assemble_paragraphs(&cleaned)
    }

    /// Bucket fragments by `round(y / tolerance)`. A bucket one step below the
    /// current line's anchor still joins that line, so jitter across a
    /// rounding boundary does not split it.
    fn group_lines(&self, fragments: &[Fragment]) -> Vec<Line> {
        let mut buckets: BTreeMap<i64, Vec<&Fragment>> = BTreeMap::new();
        for fragment in fragments {
            if !fragment.y.is_finite() || !fragment.x.is_finite() {
                continue;
            }
            let key = (fragment.y / self.line_tolerance).round() as i64;
            buckets.entry(key).or_default().push(fragment);
        }

        let mut grouped: Vec<(i64, Vec<&Fragment>)> = Vec::new();
        for (key, members) in buckets.into_iter().rev() {
            match grouped.last_mut() {
                Some((anchor, line)) if *anchor - key <= 1 => line.extend(members),
                _ => grouped.push((key, members)),
            }
        }

        grouped
            .into_iter()
            .filter_map(|(anchor, mut members)| {
                members.sort_by(|a, b| a.x.total_cmp(&b.x));
                let text: String = members.iter().map(|f| f.text.as_str()).collect();
                let text = text.trim();
                (!text.is_empty()).then(|| Line {
                    y: anchor as f32 * self.line_tolerance,
                    text: text.to_string(),
                })
            })
            .collect()
    }

    /// Gap above which two consecutive lines are split into paragraphs.
    fn gap_threshold(&self, lines: &[Line]) -> Option<f32> {
        let factor = self.paragraph_gap_factor?;
        let mut gaps: Vec<f32> = lines
            .windows(2)
            .map(|pair| pair[0].y - pair[1].y)
            .filter(|gap| *gap > 0.0)
            .collect();
        if gaps.is_empty() {
            return None;
        }
        gaps.sort_by(|a, b| a.total_cmp(b));
        Some(gaps[gaps.len() / 2] * factor)
    }
}

/// Collapse embedded newlines and repeated spaces.
pub fn clean_line(text: &str) -> String {
    let text = RE_NEWLINE_RUN.replace_all(text, " ");
    let text = RE_MULTI_SPACE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Join cleaned lines into paragraphs. Empty lines end the current paragraph;
/// a trailing hyphen is dropped and the next line joined without a space.
pub fn assemble_paragraphs<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in lines {
        let line = line.as_ref();
        if line.is_empty() {
            flush_paragraph(&mut current, &mut paragraphs);
            continue;
        }
        if current.ends_with('-') {
            current.pop();
        } else if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(line);
    }

    flush_paragraph(&mut current, &mut paragraphs);
    paragraphs
}

fn flush_paragraph(current: &mut String, paragraphs: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        paragraphs.push(trimmed.to_string());
    }
    current.clear();
}
