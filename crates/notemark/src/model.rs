use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Category of a scanned item. Exactly one holds per item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Task,
    CompletedTask,
    Idea,
    Principle,
}

/// Structural family a header scope is opened for. Completed tasks share the task scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Task,
    Idea,
    Principle,
}

impl ScopeKind {
    pub fn index(self) -> usize {
        match self {
            ScopeKind::Task => 0,
            ScopeKind::Idea => 1,
            ScopeKind::Principle => 2,
        }
    }
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Task => "task",
            Category::CompletedTask => "completed",
            Category::Idea => "idea",
            Category::Principle => "principle",
        }
    }
}

/// One annotated line. `(path, line)` is only valid until the next scan of `path`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationItem {
    /// Vault-relative document path using forward slashes.
    pub path: String,
    /// 0-based line index within the document.
    pub line: usize,
    pub raw_text: String,
    pub category: Category,
    pub has_checkbox: bool,
    pub markers: Vec<String>,
    /// Document modification time (unix ms) at scan time.
    pub created_at: i64,
    pub is_section: bool,
    pub section_level: Option<u8>,
    pub parent_line: Option<usize>,
    pub child_lines: Vec<usize>,
    pub inferred_group_tag: String,
    pub priority_rank: u8,
    pub completed_on: Option<NaiveDate>,
}

impl AnnotationItem {
    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }

    /// `path:line` with a 1-based line number, as shown to users.
    pub fn locator(&self) -> String {
        format!("{}:{}", self.path, self.line + 1)
    }
}

/// The four category lists produced by one scan of one document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentItems {
    pub tasks: Vec<AnnotationItem>,
    pub completed: Vec<AnnotationItem>,
    pub ideas: Vec<AnnotationItem>,
    pub principles: Vec<AnnotationItem>,
}

impl DocumentItems {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
            && self.completed.is_empty()
            && self.ideas.is_empty()
            && self.principles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len() + self.completed.len() + self.ideas.len() + self.principles.len()
    }

    pub fn push(&mut self, item: AnnotationItem) {
        self.list_mut(item.category).push(item);
    }

    pub fn list(&self, category: Category) -> &[AnnotationItem] {
        match category {
            Category::Task => &self.tasks,
            Category::CompletedTask => &self.completed,
            Category::Idea => &self.ideas,
            Category::Principle => &self.principles,
        }
    }

    fn list_mut(&mut self, category: Category) -> &mut Vec<AnnotationItem> {
        match category {
            Category::Task => &mut self.tasks,
            Category::CompletedTask => &mut self.completed,
            Category::Idea => &mut self.ideas,
            Category::Principle => &mut self.principles,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotationItem> {
        self.tasks
            .iter()
            .chain(self.completed.iter())
            .chain(self.ideas.iter())
            .chain(self.principles.iter())
    }

    pub fn at_line(&self, line: usize) -> Option<&AnnotationItem> {
        self.iter().find(|item| item.line == line)
    }

    pub fn at_line_mut(&mut self, line: usize) -> Option<&mut AnnotationItem> {
        self.tasks
            .iter_mut()
            .chain(self.completed.iter_mut())
            .chain(self.ideas.iter_mut())
            .chain(self.principles.iter_mut())
            .find(|item| item.line == line)
    }
}

/// Aggregate over open tasks sharing a non-structural marker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub marker: String,
    pub count: usize,
    pub latest_created_at: i64,
    pub min_priority_rank: u8,
}

/// Marker derived from a document's file name, e.g. `Projects/Home Office.md` -> `#home-office`.
pub fn inferred_group_tag(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = file.strip_suffix(".md").unwrap_or(file);

    let normalized: String = stem.nfkd().collect::<String>().to_lowercase();
    let mut out = String::new();
    let mut pending_hyphen = false;
    for ch in normalized.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch);
        } else if !ch.is_ascii() && !ch.is_whitespace() {
            // combining marks left over from decomposition
            continue;
        } else {
            pending_hyphen = true;
        }
    }

    if out.is_empty() {
        return "#note".to_string();
    }
    format!("#{out}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_tag_from_file_name() {
        assert_eq!(inferred_group_tag("Projects/Home Office.md"), "#home-office");
        assert_eq!(inferred_group_tag("Café -- Notes.md"), "#cafe-notes");
        assert_eq!(inferred_group_tag("2024_plan.md"), "#2024_plan");
        assert_eq!(inferred_group_tag("!!!.md"), "#note");
    }

    #[test]
    fn categories_serialize_in_snake_case() {
        let value = serde_json::to_value([Category::CompletedTask, Category::Principle]).unwrap();
        assert_eq!(value, serde_json::json!(["completed_task", "principle"]));
    }
}
