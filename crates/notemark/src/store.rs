use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::MarkerConfig;
use crate::model::{AnnotationItem, Category, DocumentItems, GroupInfo};

/// What changed in the store when observers are notified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateEvent {
    /// A document was (re)scanned and its lists replaced.
    Scanned(String),
    /// A document's lists were dropped (deleted or renamed away).
    Removed(String),
    /// A full vault scan finished.
    Rebuilt,
}

/// Handle returned by [`AnnotationStore::on_updated`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type UpdateHandler = Box<dyn Fn(&UpdateEvent)>;

/// Per-document item caches plus the observers interested in changes.
///
/// Single-threaded by contract: no internal locking.
#[derive(Default)]
pub struct AnnotationStore {
    documents: BTreeMap<String, DocumentItems>,
    listeners: Vec<(SubscriptionId, UpdateHandler)>,
    next_id: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the lists for `path`; an empty result removes the entry.
    pub fn replace(&mut self, path: &str, items: DocumentItems) {
        if items.is_empty() {
            self.documents.remove(path);
        } else {
            self.documents.insert(path.to_string(), items);
        }
    }

    /// Drops the lists for `path`. Returns whether anything was cached.
    pub fn remove(&mut self, path: &str) -> bool {
        self.documents.remove(path).is_some()
    }

    pub fn document(&self, path: &str) -> Option<&DocumentItems> {
        self.documents.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn find(&self, path: &str, line: usize) -> Option<&AnnotationItem> {
        self.documents.get(path)?.at_line(line)
    }

    /// Open tasks across all documents, oldest first.
    pub fn tasks(&self) -> Vec<AnnotationItem> {
        self.collect(Category::Task, oldest_first, None, &[])
    }

    /// Completed tasks, newest first, optionally capped and without `exclude` documents.
    pub fn completed_tasks(&self, limit: Option<usize>, exclude: &[String]) -> Vec<AnnotationItem> {
        self.collect(Category::CompletedTask, newest_first, limit, exclude)
    }

    pub fn ideas(&self) -> Vec<AnnotationItem> {
        self.collect(Category::Idea, oldest_first, None, &[])
    }

    pub fn principles(&self, limit: Option<usize>, exclude: &[String]) -> Vec<AnnotationItem> {
        self.collect(Category::Principle, newest_first, limit, exclude)
    }

    /// Open tasks carrying `marker` explicitly or through their document's inferred tag.
    pub fn tasks_in_group(&self, marker: &str) -> Vec<AnnotationItem> {
        self.tasks()
            .into_iter()
            .filter(|item| item.has_marker(marker) || item.inferred_group_tag == marker)
            .collect()
    }

    /// Aggregates open tasks by their non-structural markers.
    ///
    /// Tasks without any such marker are grouped under their inferred document tag.
    pub fn groups(&self, markers: &MarkerConfig) -> Vec<GroupInfo> {
        let mut groups: BTreeMap<String, GroupInfo> = BTreeMap::new();
        for item in self.documents.values().flat_map(|doc| doc.tasks.iter()) {
            let mut keys: Vec<&str> = item
                .markers
                .iter()
                .map(String::as_str)
                .filter(|m| !markers.is_structural(m))
                .collect();
            keys.sort_unstable();
            keys.dedup();
            if keys.is_empty() {
                keys.push(&item.inferred_group_tag);
            }
            for key in keys {
                let entry = groups.entry(key.to_string()).or_insert_with(|| GroupInfo {
                    marker: key.to_string(),
                    count: 0,
                    latest_created_at: item.created_at,
                    min_priority_rank: item.priority_rank,
                });
                entry.count += 1;
                entry.latest_created_at = entry.latest_created_at.max(item.created_at);
                entry.min_priority_rank = entry.min_priority_rank.min(item.priority_rank);
            }
        }
        groups.into_values().collect()
    }

    pub fn on_updated<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&UpdateEvent) + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn notify(&self, event: &UpdateEvent) {
        for (_, handler) in &self.listeners {
            handler(event);
        }
    }

    fn collect(
        &self,
        category: Category,
        order: fn(&AnnotationItem, &AnnotationItem) -> Ordering,
        limit: Option<usize>,
        exclude: &[String],
    ) -> Vec<AnnotationItem> {
        let mut items: Vec<AnnotationItem> = self
            .documents
            .iter()
            .filter(|(path, _)| !exclude.iter().any(|excluded| excluded == *path))
            .flat_map(|(_, doc)| doc.list(category).iter().cloned())
            .collect();
        items.sort_by(order);
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        items
    }
}

fn oldest_first(a: &AnnotationItem, b: &AnnotationItem) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| a.line.cmp(&b.line))
}

fn newest_first(a: &AnnotationItem, b: &AnnotationItem) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| a.line.cmp(&b.line))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn item(path: &str, line: usize, category: Category, created_at: i64) -> AnnotationItem {
        AnnotationItem {
            path: path.to_string(),
            line,
            raw_text: format!("line {line}"),
            category,
            has_checkbox: false,
            markers: Vec::new(),
            created_at,
            is_section: false,
            section_level: None,
            parent_line: None,
            child_lines: Vec::new(),
            inferred_group_tag: "#doc".to_string(),
            priority_rank: 4,
            completed_on: None,
        }
    }

    fn docs(entries: Vec<AnnotationItem>) -> DocumentItems {
        let mut out = DocumentItems::default();
        for entry in entries {
            out.push(entry);
        }
        out
    }

    #[test]
    fn empty_replace_removes_entry() {
        let mut store = AnnotationStore::new();
        store.replace("a.md", docs(vec![item("a.md", 0, Category::Task, 1)]));
        assert!(store.document("a.md").is_some());
        store.replace("a.md", DocumentItems::default());
        assert!(store.document("a.md").is_none());
    }

    #[test]
    fn accessors_sort_and_filter() {
        let mut store = AnnotationStore::new();
        store.replace(
            "b.md",
            docs(vec![
                item("b.md", 0, Category::Task, 20),
                item("b.md", 1, Category::CompletedTask, 20),
            ]),
        );
        store.replace(
            "a.md",
            docs(vec![
                item("a.md", 3, Category::Task, 10),
                item("a.md", 4, Category::CompletedTask, 10),
            ]),
        );
        store.replace(
            "Archive.md",
            docs(vec![item("Archive.md", 0, Category::CompletedTask, 30)]),
        );

        let tasks: Vec<_> = store.tasks().into_iter().map(|i| i.path).collect();
        assert_eq!(tasks, vec!["a.md", "b.md"]);

        let completed: Vec<_> = store
            .completed_tasks(None, &["Archive.md".to_string()])
            .into_iter()
            .map(|i| i.path)
            .collect();
        assert_eq!(completed, vec!["b.md", "a.md"]);

        assert_eq!(store.completed_tasks(Some(1), &[])[0].path, "Archive.md");
    }

    #[test]
    fn observers_can_unsubscribe() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = AnnotationStore::new();
        let sink = Rc::clone(&seen);
        let id = store.on_updated(move |event| sink.borrow_mut().push(event.clone()));

        store.notify(&UpdateEvent::Scanned("a.md".into()));
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.notify(&UpdateEvent::Removed("a.md".into()));

        assert_eq!(*seen.borrow(), vec![UpdateEvent::Scanned("a.md".into())]);
    }

    #[test]
    fn groups_aggregate_non_structural_markers() {
        let markers = MarkerConfig::default();
        let mut first = item("a.md", 0, Category::Task, 5);
        first.markers = vec!["#task".into(), "#home".into(), "#p2".into()];
        first.priority_rank = 2;
        let mut second = item("a.md", 1, Category::Task, 9);
        second.markers = vec!["#task".into(), "#home".into()];
        let mut third = item("b.md", 0, Category::Task, 3);
        third.markers = vec!["#task".into()];
        third.inferred_group_tag = "#b".into();

        let mut store = AnnotationStore::new();
        store.replace("a.md", docs(vec![first, second]));
        store.replace("b.md", docs(vec![third]));

        let groups = store.groups(&markers);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].marker, "#b");
        assert_eq!(groups[1].marker, "#home");
        assert_eq!(groups[1].count, 2);
        assert_eq!(groups[1].latest_created_at, 9);
        assert_eq!(groups[1].min_priority_rank, 2);

        assert_eq!(store.tasks_in_group("#b").len(), 1);
    }
}
