//! Stateless, line-level recognizers for markers, code spans, fences, checkboxes,
//! headings and list items.
//!
//! Everything here is string-in, struct-out so the classifier and scanner can be
//! exercised without any storage.

use std::ops::Range;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

/// One `#marker` token with its byte range in the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker {
    pub text: String,
    pub range: Range<usize>,
}

/// Markers on a line split by whether an inline code span protects them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkerScan {
    pub live: Vec<Marker>,
    pub shielded: Vec<Marker>,
}

impl MarkerScan {
    /// Markers were written on the line but every one sits inside inline code.
    pub fn only_shielded(&self) -> bool {
        self.live.is_empty() && !self.shielded.is_empty()
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.live.iter().any(|m| m.text == marker)
    }

    pub fn first(&self, marker: &str) -> Option<&Marker> {
        self.live.iter().find(|m| m.text == marker)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.live.iter().map(|m| m.text.clone()).collect()
    }
}

fn marker_regex() -> &'static Regex {
    static MARKER_REGEX: OnceLock<Regex> = OnceLock::new();
    MARKER_REGEX.get_or_init(|| Regex::new(r"(?:^|\s)(#[\w-]+)").expect("Invalid regex"))
}

fn list_regex() -> &'static Regex {
    static LIST_REGEX: OnceLock<Regex> = OnceLock::new();
    LIST_REGEX
        .get_or_init(|| Regex::new(r"^(\s*)(?:[-*+]|\d+[.)])(?:\s+|$)").expect("Invalid regex"))
}

fn checkbox_regex() -> &'static Regex {
    static CHECKBOX_REGEX: OnceLock<Regex> = OnceLock::new();
    CHECKBOX_REGEX.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+\[([ xX])\](?:\s|$)").expect("Invalid regex")
    })
}

fn date_stamp_regex() -> &'static Regex {
    static DATE_REGEX: OnceLock<Regex> = OnceLock::new();
    DATE_REGEX.get_or_init(|| Regex::new(r"^\s@(\d{4}-\d{2}-\d{2})").expect("Invalid regex"))
}

/// Finds `#` + word/hyphen tokens that start the line or follow whitespace.
pub fn scan_markers(line: &str) -> MarkerScan {
    let spans = inline_code_spans(line);
    let mut scan = MarkerScan::default();
    for cap in marker_regex().captures_iter(line) {
        let Some(token) = cap.get(1) else {
            continue;
        };
        let marker = Marker {
            text: token.as_str().to_string(),
            range: token.range(),
        };
        if spans
            .iter()
            .any(|span| marker.range.start > span.start && marker.range.start < span.end)
        {
            scan.shielded.push(marker);
        } else {
            scan.live.push(marker);
        }
    }
    scan
}

/// Byte ranges `[open, close]` of backtick-delimited spans.
///
/// An odd number of backticks yields no spans at all.
pub fn inline_code_spans(line: &str) -> Vec<Range<usize>> {
    let ticks: Vec<usize> = line
        .char_indices()
        .filter(|(_, ch)| *ch == '`')
        .map(|(idx, _)| idx)
        .collect();
    if ticks.len() % 2 != 0 {
        return Vec::new();
    }
    ticks.chunks(2).map(|pair| pair[0]..pair[1]).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FenceState {
    ch: char,
    len: usize,
}

/// Returns `Some(next_state)` when the line is a fence delimiter, `None` otherwise.
pub fn fence_update(current: Option<&FenceState>, line: &str) -> Option<Option<FenceState>> {
    let trimmed = line.trim_start();
    let (ch, run) = if trimmed.starts_with("```") {
        ('`', count_run(trimmed, '`'))
    } else if trimmed.starts_with("~~~") {
        ('~', count_run(trimmed, '~'))
    } else {
        return None;
    };

    let Some(cur) = current else {
        return Some(Some(FenceState { ch, len: run }));
    };

    if cur.ch == ch && run >= cur.len {
        return Some(None);
    }

    Some(Some(cur.clone()))
}

fn count_run(s: &str, ch: char) -> usize {
    s.chars().take_while(|c| *c == ch).count()
}

/// ATX heading depth and title.
pub fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let trimmed = line.strip_prefix("   ").unwrap_or(line);
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }

    let after = trimmed.get(hashes..)?;
    let after = after.strip_prefix(' ')?;
    Some((hashes as u8, after.trim_end()))
}

/// A `[ ]` / `[x]` list line; `mark` is the byte offset of the glyph inside the brackets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkbox {
    pub checked: bool,
    pub mark: usize,
}

pub fn parse_checkbox(line: &str) -> Option<Checkbox> {
    let cap = checkbox_regex().captures(line)?;
    let glyph = cap.get(1)?;
    Some(Checkbox {
        checked: glyph.as_str() != " ",
        mark: glyph.start(),
    })
}

/// Length of the bullet or number prefix (including trailing whitespace).
pub fn list_prefix_len(line: &str) -> Option<usize> {
    list_regex().find(line).map(|m| m.end())
}

pub fn is_list_item(line: &str) -> bool {
    list_prefix_len(line).is_some()
}

/// Date stamp (`@YYYY-MM-DD`) directly following the marker ending at `after`.
pub fn date_stamp_after(line: &str, after: usize) -> Option<(NaiveDate, Range<usize>)> {
    let rest = line.get(after..)?;
    let cap = date_stamp_regex().captures(rest)?;
    let whole = cap.get(0)?;
    let date = NaiveDate::parse_from_str(cap.get(1)?.as_str(), "%Y-%m-%d").ok()?;
    Some((date, after + whole.start()..after + whole.end()))
}

/// Line text with heading hashes, list bullet and checkbox removed.
pub fn strip_structure(line: &str) -> &str {
    let trimmed = line.trim();
    if let Some((_, title)) = parse_heading(trimmed) {
        return title.trim();
    }
    let Some(prefix) = list_prefix_len(trimmed) else {
        return trimmed;
    };
    let rest = &trimmed[prefix..];
    for box_prefix in ["[ ]", "[x]", "[X]"] {
        if let Some(after) = rest.strip_prefix(box_prefix) {
            return after.trim();
        }
    }
    rest.trim()
}

/// True when something besides markers, date stamps and structural punctuation remains.
pub fn has_content(line: &str) -> bool {
    let body = strip_structure(line);
    let scan = scan_markers(body);
    let mut cut: Vec<Range<usize>> = Vec::new();
    for marker in &scan.live {
        cut.push(marker.range.clone());
        if let Some((_, stamp)) = date_stamp_after(body, marker.range.end) {
            cut.push(stamp);
        }
    }
    body.char_indices()
        .filter(|(idx, _)| !cut.iter().any(|range| range.contains(idx)))
        .any(|(_, ch)| ch.is_alphanumeric())
}
