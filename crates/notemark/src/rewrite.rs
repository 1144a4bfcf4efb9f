//! Single-line text transforms shared by scan repairs and user mutations.
//!
//! None of these change the number of lines in a document, so line numbers held
//! by other cached items of the same document stay valid across a rewrite.

use std::ops::Range;

use chrono::NaiveDate;

use crate::classify::RepairKind;
use crate::config::MarkerConfig;
use crate::recognize::{
    date_stamp_after, list_prefix_len, parse_checkbox, scan_markers, strip_structure,
};

/// A document split into lines, remembering carriage returns so rewrites keep them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentLines {
    lines: Vec<String>,
}

impl DocumentLines {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.lines
            .get(idx)
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
    }

    /// Replaces the content of line `idx`; returns false when the line does not exist.
    pub fn set(&mut self, idx: usize, content: &str) -> bool {
        let Some(slot) = self.lines.get_mut(idx) else {
            return false;
        };
        if slot.ends_with('\r') {
            *slot = format!("{content}\r");
        } else {
            *slot = content.to_string();
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
    }

    pub fn join(&self) -> String {
        self.lines.join("\n")
    }
}

fn date_stamp(date: NaiveDate) -> String {
    format!("@{}", date.format("%Y-%m-%d"))
}

/// Removes `range` together with one adjacent space.
fn remove_range(line: &str, range: Range<usize>) -> String {
    let before = &line[..range.start];
    let after = &line[range.end..];
    if let Some(trimmed) = before.strip_suffix(' ') {
        format!("{trimmed}{after}")
    } else if let Some(trimmed) = after.strip_prefix(' ') {
        format!("{before}{trimmed}")
    } else {
        format!("{before}{after}")
    }
}

fn replace_range(line: &str, range: Range<usize>, with: &str) -> String {
    format!("{}{with}{}", &line[..range.start], &line[range.end..])
}

/// Range of a marker occurrence plus the date stamp that follows it, if any.
fn with_stamp(line: &str, range: Range<usize>) -> Range<usize> {
    match date_stamp_after(line, range.end) {
        Some((_, stamp)) => range.start..stamp.end,
        None => range,
    }
}

/// Removes every live occurrence of `marker`. `None` when the marker is absent.
pub fn drop_marker(line: &str, marker: &str) -> Option<String> {
    let scan = scan_markers(line);
    let ranges: Vec<Range<usize>> = scan
        .live
        .iter()
        .filter(|m| m.text == marker)
        .map(|m| m.range.clone())
        .collect();
    if ranges.is_empty() {
        return None;
    }
    let mut out = line.to_string();
    for range in ranges.into_iter().rev() {
        out = remove_range(&out, range);
    }
    Some(out)
}

/// Removes every completed marker along with its date stamp.
fn drop_completion(line: &str, markers: &MarkerConfig) -> String {
    let scan = scan_markers(line);
    let ranges: Vec<Range<usize>> = scan
        .live
        .iter()
        .filter(|m| m.text == markers.completed)
        .map(|m| with_stamp(line, m.range.clone()))
        .collect();
    let mut out = line.to_string();
    for range in ranges.into_iter().rev() {
        out = remove_range(&out, range);
    }
    out
}

/// Appends ` marker` at the end of the line's content.
pub fn append_marker(line: &str, marker: &str) -> String {
    let trimmed = line.trim_end();
    if trimmed.trim().is_empty() {
        return format!("{trimmed}{marker}");
    }
    format!("{trimmed} {marker}")
}

/// Sets the checkbox glyph when the line has one; other lines are returned unchanged.
pub fn set_checkbox(line: &str, checked: bool) -> String {
    match parse_checkbox(line) {
        Some(checkbox) => {
            let glyph = if checked { "x" } else { " " };
            replace_range(line, checkbox.mark..checkbox.mark + 1, glyph)
        }
        None => line.to_string(),
    }
}

/// Marks a task line completed on `date`.
///
/// The first active marker is swapped in place for `completed @date`; lines without
/// one get the completed marker appended. Any checkbox is ticked.
pub fn complete_line(line: &str, markers: &MarkerConfig, date: NaiveDate) -> String {
    let scan = scan_markers(line);
    let stamped = format!("{} {}", markers.completed, date_stamp(date));

    let mut out = if scan.contains(&markers.completed) {
        line.to_string()
    } else if let Some(active) = scan.first(&markers.task) {
        replace_range(line, active.range.clone(), &stamped)
    } else {
        append_marker(line, &stamped)
    };

    if let Some(dropped) = drop_marker(&out, &markers.task) {
        out = dropped;
    }
    set_checkbox(&out, true)
}

/// Reverses [`complete_line`]. `None` when the line carries no completed marker.
///
/// The completed marker always turns back into the active marker. A completed line
/// does not record whether its marker was appended, and dropping a marker the user
/// wrote would lose it.
pub fn uncomplete_line(line: &str, markers: &MarkerConfig) -> Option<String> {
    let scan = scan_markers(line);
    let done = scan.first(&markers.completed)?;
    let range = with_stamp(line, done.range.clone());

    let mut out = replace_range(line, range, &markers.task);
    out = drop_completion(&out, markers);
    Some(set_checkbox(&out, false))
}

/// Swaps the first live occurrence of `from` for `to`.
pub fn replace_marker(line: &str, from: &str, to: &str) -> Option<String> {
    let scan = scan_markers(line);
    let found = scan.first(from)?;
    Some(replace_range(line, found.range.clone(), to))
}

/// Replaces any priority marker with `priority`, placed right after the task marker.
pub fn set_priority(line: &str, markers: &MarkerConfig, priority: &str, focus: bool) -> String {
    let mut out = line.to_string();
    for existing in &markers.priorities {
        if let Some(dropped) = drop_marker(&out, existing) {
            out = dropped;
        }
    }

    let mut insert = priority.to_string();
    if focus && !scan_markers(&out).contains(&markers.focus) {
        insert.push(' ');
        insert.push_str(&markers.focus);
    }

    let scan = scan_markers(&out);
    match scan.first(&markers.task) {
        Some(active) => {
            let at = active.range.end;
            format!("{} {insert}{}", &out[..at], &out[at..])
        }
        None => append_marker(&out, &insert),
    }
}

/// Turns an idea line into an open task; bullets without a checkbox gain `[ ] `.
pub fn idea_to_task(line: &str, markers: &MarkerConfig) -> String {
    let mut out = match replace_marker(line, &markers.idea, &markers.task) {
        Some(replaced) => replaced,
        None => append_marker(line, &markers.task),
    };
    if parse_checkbox(&out).is_none() {
        if let Some(prefix) = list_prefix_len(&out) {
            out = format!("{}[ ] {}", &out[..prefix], &out[prefix..]);
        }
    }
    out
}

/// Normalized archive record: `- [x] <content> <completed> @date`.
pub fn archive_entry(line: &str, markers: &MarkerConfig, date: NaiveDate) -> String {
    let body = strip_structure(line);
    let body = drop_completion(body, markers);
    let body = drop_marker(&body, &markers.task).unwrap_or(body);
    let content = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if content.is_empty() {
        return format!("- [x] {} {}", markers.completed, date_stamp(date));
    }
    format!("- [x] {content} {} {}", markers.completed, date_stamp(date))
}

/// Applies one scan repair to a line.
pub fn apply_repair(
    line: &str,
    repair: RepairKind,
    markers: &MarkerConfig,
    date: NaiveDate,
) -> String {
    match repair {
        RepairKind::DropActiveMarker => {
            drop_marker(line, &markers.task).unwrap_or_else(|| line.to_string())
        }
        RepairKind::AppendCompletion => complete_line(line, markers, date),
        RepairKind::CheckBox => set_checkbox(line, true),
    }
}
