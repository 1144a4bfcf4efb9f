use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::classify::resolve_task_state;
use crate::config::NotemarkConfig;
use crate::error::NotemarkError;
use crate::model::{AnnotationItem, Category};
use crate::recognize::{parse_checkbox, scan_markers};
use crate::rewrite::{
    DocumentLines, archive_entry, complete_line, drop_marker, idea_to_task, set_priority,
    uncomplete_line,
};
use crate::scan::{DocumentScanner, scan_text};
use crate::store::AnnotationStore;
use crate::vault::{Vault, parent_folder};

/// Outcome of one successful single-item mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    pub path: String,
    pub line: usize,
    pub before: String,
    pub after: String,
    /// Child lines rewritten together with a section.
    pub children: Vec<usize>,
    /// Whether a normalized copy reached the archive document.
    pub archived: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub locator: String,
    pub message: String,
}

/// Aggregate result of a best-effort batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    fn record<T>(&mut self, item: &AnnotationItem, result: Result<T, NotemarkError>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(err) => {
                tracing::warn!(item = %item.locator(), error = %err, "batch item failed");
                self.failed += 1;
                self.failures.push(BatchFailure {
                    locator: item.locator(),
                    message: err.to_string(),
                });
            }
        }
    }
}

/// Applies user-triggered transitions to live document text.
///
/// Every operation re-reads the document, checks that the cached line still holds
/// what the item claims, rewrites that line, writes the document back and rescans
/// it before returning.
pub struct MutationEngine<'a, V: Vault + ?Sized> {
    vault: &'a V,
    store: &'a mut AnnotationStore,
    config: &'a NotemarkConfig,
    today: NaiveDate,
}

impl<'a, V: Vault + ?Sized> MutationEngine<'a, V> {
    pub fn new(
        vault: &'a V,
        store: &'a mut AnnotationStore,
        config: &'a NotemarkConfig,
        today: NaiveDate,
    ) -> Self {
        Self {
            vault,
            store,
            config,
            today,
        }
    }

    /// Completes an open task; sections complete their open children in the same write.
    pub fn complete(&mut self, item: &AnnotationItem) -> Result<MutationReport, NotemarkError> {
        let (mut lines, before) = self.load(item)?;
        self.expect_same_structure(item, &lines)?;
        self.expect_open_task(item, &before)?;

        let markers = &self.config.markers;
        let mut touched = Vec::new();
        for &child in &item.child_lines {
            let Some(text) = lines.get(child) else {
                return Err(stale(item.path.as_str(), child, lines.len()));
            };
            let (state, _) = resolve_task_state(markers, &scan_markers(text), parse_checkbox(text));
            if state != Category::Task {
                continue;
            }
            let rewritten = complete_line(text, markers, self.today);
            lines.set(child, &rewritten);
            touched.push(child);
        }

        let after = complete_line(&before, markers, self.today);
        lines.set(item.line, &after);

        let mut entries: Vec<String> = touched
            .iter()
            .filter_map(|&child| lines.get(child))
            .map(|text| archive_entry(text, markers, self.today))
            .collect();
        entries.insert(0, archive_entry(&after, markers, self.today));

        self.commit(&item.path, &lines)?;
        let archived = self.append_archive(&entries);
        tracing::info!(item = %item.locator(), children = touched.len(), "completed task");

        Ok(MutationReport {
            path: item.path.clone(),
            line: item.line,
            before,
            after,
            children: touched,
            archived,
        })
    }

    /// Reopens a completed task. The archive is append-only and stays untouched.
    pub fn uncomplete(&mut self, item: &AnnotationItem) -> Result<MutationReport, NotemarkError> {
        let (lines, before) = self.load(item)?;
        if item.category != Category::CompletedTask {
            return Err(mismatch(item, format!("{} is not completed", item.category.label())));
        }
        self.expect_same_structure(item, &lines)?;
        let markers = &self.config.markers;
        let after = uncomplete_line(&before, markers)
            .ok_or_else(|| mismatch(item, format!("{} marker missing", markers.completed)))?;

        self.rewrite(item, lines, before, after, "reopened task")
    }

    /// Replaces any priority marker on an open task; `focus` also adds the focus marker.
    pub fn set_priority_marker(
        &mut self,
        item: &AnnotationItem,
        priority: &str,
        focus: bool,
    ) -> Result<MutationReport, NotemarkError> {
        let markers = &self.config.markers;
        if !markers.is_priority(priority) {
            return Err(NotemarkError::Config(format!(
                "{priority} is not a configured priority marker ({})",
                markers.priorities.join(", ")
            )));
        }
        let (lines, before) = self.load(item)?;
        self.expect_same_structure(item, &lines)?;
        self.expect_open_task(item, &before)?;
        let after = set_priority(&before, markers, priority, focus);

        self.rewrite(item, lines, before, after, "set priority")
    }

    /// Removes every whole-token occurrence of `marker` from the item's line.
    pub fn remove_marker(
        &mut self,
        item: &AnnotationItem,
        marker: &str,
    ) -> Result<MutationReport, NotemarkError> {
        let (lines, before) = self.load(item)?;
        self.expect_same_structure(item, &lines)?;
        let after = drop_marker(&before, marker)
            .ok_or_else(|| mismatch(item, format!("{marker} not present")))?;

        self.rewrite(item, lines, before, after, "removed marker")
    }

    pub fn convert_idea_to_task(
        &mut self,
        item: &AnnotationItem,
    ) -> Result<MutationReport, NotemarkError> {
        let (lines, before) = self.load(item)?;
        if item.category != Category::Idea {
            return Err(mismatch(item, format!("{} is not an idea", item.category.label())));
        }
        self.expect_same_structure(item, &lines)?;
        let markers = &self.config.markers;
        let marked = scan_markers(&before).contains(&markers.idea);
        let inherited = item.parent_line.is_some() && before.trim() == item.raw_text;
        if !marked && !inherited {
            return Err(mismatch(item, format!("{} marker missing", markers.idea)));
        }
        let after = idea_to_task(&before, markers);

        self.rewrite(item, lines, before, after, "converted idea")
    }

    /// Completes every item, continuing past failures.
    ///
    /// Children whose section is part of the same batch are left to the section.
    /// They count as done when the section rewrote them and are attempted on their
    /// own otherwise, so every item is accounted for exactly once.
    pub fn complete_all(&mut self, items: &[AnnotationItem]) -> BatchOutcome {
        let is_covered = |item: &AnnotationItem| {
            item.parent_line.is_some_and(|parent| {
                items
                    .iter()
                    .any(|other| other.is_section && other.path == item.path && other.line == parent)
            })
        };

        let mut outcome = BatchOutcome::default();
        // (path, section line) -> child lines the section completed; empty when it failed
        let mut completed_by_section: BTreeMap<(&str, usize), Vec<usize>> = BTreeMap::new();
        for item in items.iter().filter(|item| !is_covered(*item)) {
            let result = self.complete(item);
            if item.is_section {
                let children = result.as_ref().map(|r| r.children.clone()).unwrap_or_default();
                completed_by_section.insert((item.path.as_str(), item.line), children);
            }
            outcome.record(item, result);
        }

        for item in items.iter().filter(|item| is_covered(*item)) {
            let done_by_section = item.parent_line.is_some_and(|parent| {
                completed_by_section
                    .get(&(item.path.as_str(), parent))
                    .is_some_and(|children| children.contains(&item.line))
            });
            if done_by_section {
                outcome.record(item, Ok::<(), NotemarkError>(()));
            } else {
                let result = self.complete(item);
                outcome.record(item, result);
            }
        }
        outcome
    }

    pub fn uncomplete_all(&mut self, items: &[AnnotationItem]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for item in items {
            let result = self.uncomplete(item);
            outcome.record(item, result);
        }
        outcome
    }

    pub fn set_priority_all(
        &mut self,
        items: &[AnnotationItem],
        priority: &str,
        focus: bool,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for item in items {
            let result = self.set_priority_marker(item, priority, focus);
            outcome.record(item, result);
        }
        outcome
    }

    fn load(&self, item: &AnnotationItem) -> Result<(DocumentLines, String), NotemarkError> {
        let text = self.vault.read_document(&item.path)?;
        let lines = DocumentLines::parse(&text);
        let line = lines
            .get(item.line)
            .ok_or_else(|| stale(&item.path, item.line, lines.len()))?
            .to_string();
        Ok((lines, line))
    }

    /// Re-classifies the current text and checks the item still sits in the same
    /// place of the document structure: same category, same section, same children.
    fn expect_same_structure(
        &self,
        item: &AnnotationItem,
        lines: &DocumentLines,
    ) -> Result<(), NotemarkError> {
        let fresh = scan_text(&item.path, &lines.join(), item.created_at, &self.config.markers);
        let Some(current) = fresh.items.at_line(item.line) else {
            return Err(mismatch(item, "line no longer holds an annotated item".to_string()));
        };
        if current.category != item.category {
            return Err(mismatch(
                item,
                format!("line is now a {}, not a {}", current.category.label(), item.category.label()),
            ));
        }
        if current.is_section != item.is_section || current.parent_line != item.parent_line {
            return Err(mismatch(item, "section membership changed".to_string()));
        }
        if current.child_lines != item.child_lines {
            return Err(mismatch(item, "section children changed".to_string()));
        }
        Ok(())
    }

    fn expect_open_task(&self, item: &AnnotationItem, line: &str) -> Result<(), NotemarkError> {
        if item.category != Category::Task {
            return Err(mismatch(item, format!("{} is not an open task", item.category.label())));
        }
        let markers = &self.config.markers;
        let scan = scan_markers(line);
        if scan.contains(&markers.completed) {
            return Err(mismatch(item, format!("line already carries {}", markers.completed)));
        }
        if parse_checkbox(line).is_some_and(|checkbox| checkbox.checked) {
            return Err(mismatch(item, "checkbox is already ticked".to_string()));
        }
        let inherited = item.parent_line.is_some() && line.trim() == item.raw_text;
        if !scan.contains(&markers.task) && !inherited {
            return Err(mismatch(item, format!("{} marker missing", markers.task)));
        }
        Ok(())
    }

    fn rewrite(
        &mut self,
        item: &AnnotationItem,
        mut lines: DocumentLines,
        before: String,
        after: String,
        action: &str,
    ) -> Result<MutationReport, NotemarkError> {
        lines.set(item.line, &after);
        self.commit(&item.path, &lines)?;
        tracing::info!(item = %item.locator(), "{action}");

        Ok(MutationReport {
            path: item.path.clone(),
            line: item.line,
            before,
            after,
            children: Vec::new(),
            archived: false,
        })
    }

    fn commit(&mut self, path: &str, lines: &DocumentLines) -> Result<(), NotemarkError> {
        self.vault.write_document(path, &lines.join())?;
        self.rescan(path)
    }

    fn rescan(&mut self, path: &str) -> Result<(), NotemarkError> {
        DocumentScanner::new(self.vault, &self.config.markers, self.today)
            .scan_into(self.store, path)
            .map(|_| ())
    }

    /// Appends entries to the archive, creating it (and its folder) when missing.
    ///
    /// The source document is already written at this point, so failures are logged
    /// and reported as `false` rather than returned.
    fn append_archive(&mut self, entries: &[String]) -> bool {
        match self.try_append_archive(entries) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(archive = %self.config.archive_path, error = %err, "archive append failed");
                false
            }
        }
    }

    fn try_append_archive(&mut self, entries: &[String]) -> Result<(), NotemarkError> {
        let path = self.config.archive_path.as_str();
        if !self.vault.exists(path) {
            if let Some(folder) = parent_folder(path) {
                self.vault.ensure_folder(folder)?;
            }
            self.vault.create_document(path, "")?;
        }

        let mut text = self.vault.read_document(path)?;
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        for entry in entries {
            text.push_str(entry);
            text.push('\n');
        }
        self.vault.write_document(path, &text)?;
        self.rescan(path)
    }
}

fn stale(path: &str, line: usize, line_count: usize) -> NotemarkError {
    NotemarkError::StaleReference {
        path: path.to_string(),
        line,
        line_count,
    }
}

fn mismatch(item: &AnnotationItem, reason: String) -> NotemarkError {
    NotemarkError::PreconditionMismatch {
        path: item.path.clone(),
        line: item.line,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::InMemoryVault;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn scanned(vault: &InMemoryVault, config: &NotemarkConfig, path: &str) -> AnnotationStore {
        let mut store = AnnotationStore::new();
        DocumentScanner::new(vault, &config.markers, day())
            .scan_into(&mut store, path)
            .unwrap();
        store
    }

    #[test]
    fn complete_rewrites_line_and_archives() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([("Inbox.md", "# Inbox\n- [ ] #task write report\n")]);
        let mut store = scanned(&vault, &config, "Inbox.md");
        let item = store.tasks()[0].clone();

        let report = MutationEngine::new(&vault, &mut store, &config, day())
            .complete(&item)
            .unwrap();

        assert_eq!(report.after, "- [x] #task-done @2024-03-01 write report");
        assert!(report.archived);
        assert_eq!(
            vault.read_document("Inbox.md").unwrap(),
            "# Inbox\n- [x] #task-done @2024-03-01 write report\n"
        );
        assert_eq!(
            vault.read_document("Archive/Completed.md").unwrap(),
            "- [x] write report #task-done @2024-03-01\n"
        );
        assert!(vault.has_folder("Archive"));
        assert!(store.tasks().is_empty());
        assert_eq!(store.completed_tasks(None, &config.completed_exclusions()).len(), 1);
    }

    #[test]
    fn stale_line_leaves_document_untouched() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([("a.md", "x\n- [ ] #task later")]);
        let mut store = scanned(&vault, &config, "a.md");
        let item = store.tasks()[0].clone();

        vault.put("a.md", "x");
        let err = MutationEngine::new(&vault, &mut store, &config, day())
            .complete(&item)
            .unwrap_err();
        assert!(matches!(err, NotemarkError::StaleReference { line: 1, line_count: 1, .. }));
        assert_eq!(vault.read_document("a.md").unwrap(), "x");

        vault.put("a.md", "x\n- [x] #task-done later");
        let err = MutationEngine::new(&vault, &mut store, &config, day())
            .complete(&item)
            .unwrap_err();
        assert!(matches!(err, NotemarkError::PreconditionMismatch { .. }));
        assert_eq!(vault.read_document("a.md").unwrap(), "x\n- [x] #task-done later");
        assert!(!vault.exists("Archive/Completed.md"));
    }

    #[test]
    fn section_completes_children_in_one_write() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([(
            "Plan.md",
            "## Sprint #task\n- [ ] one\n- [x] #task-done @2024-01-01 two\n- three",
        )]);
        let mut store = scanned(&vault, &config, "Plan.md");
        let section = store.tasks().into_iter().find(|i| i.is_section).unwrap();
        let writes = vault.write_count();

        let report = MutationEngine::new(&vault, &mut store, &config, day())
            .complete(&section)
            .unwrap();

        assert_eq!(report.children, vec![1, 3]);
        // document write + archive create + archive append
        assert_eq!(vault.write_count(), writes + 3);
        assert_eq!(
            vault.read_document("Plan.md").unwrap(),
            "## Sprint #task-done @2024-03-01\n- [x] one #task-done @2024-03-01\n- [x] #task-done @2024-01-01 two\n- three #task-done @2024-03-01"
        );
        assert_eq!(
            vault.read_document("Archive/Completed.md").unwrap(),
            "- [x] Sprint #task-done @2024-03-01\n- [x] one #task-done @2024-03-01\n- [x] three #task-done @2024-03-01\n"
        );
    }

    #[test]
    fn section_with_inserted_line_is_rejected() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([("Plan.md", "## Sprint #task\n- one\n- two")]);
        let mut store = scanned(&vault, &config, "Plan.md");
        let section = store.tasks().into_iter().find(|i| i.is_section).unwrap();

        let edited = "## Sprint #task\nDo not touch this prose\n- one\n- two";
        vault.put("Plan.md", edited);
        let err = MutationEngine::new(&vault, &mut store, &config, day())
            .complete(&section)
            .unwrap_err();

        assert!(matches!(err, NotemarkError::PreconditionMismatch { line: 0, .. }));
        assert_eq!(vault.read_document("Plan.md").unwrap(), edited);
        assert!(!vault.exists("Archive/Completed.md"));
    }

    #[test]
    fn inherited_child_of_unmarked_header_is_rejected() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([("Plan.md", "## Sprint #task\n- one")]);
        let mut store = scanned(&vault, &config, "Plan.md");
        let child = store.tasks().into_iter().find(|i| !i.is_section).unwrap();

        vault.put("Plan.md", "## Sprint\n- one");
        let err = MutationEngine::new(&vault, &mut store, &config, day())
            .complete(&child)
            .unwrap_err();

        assert!(err.is_stale());
        assert_eq!(vault.read_document("Plan.md").unwrap(), "## Sprint\n- one");
    }

    #[test]
    fn child_with_trailing_marker_round_trips() {
        let config = NotemarkConfig::default();
        let original = "## Sprint #task\n- [ ] write report #task";
        let vault = InMemoryVault::with_documents([("Plan.md", original)]);
        let mut store = scanned(&vault, &config, "Plan.md");
        let child = store.tasks().into_iter().find(|i| !i.is_section).unwrap();

        MutationEngine::new(&vault, &mut store, &config, day())
            .complete(&child)
            .unwrap();
        let done = store
            .completed_tasks(None, &config.completed_exclusions())
            .into_iter()
            .find(|i| i.line == 1)
            .unwrap();
        assert_eq!(done.parent_line, Some(0));
        MutationEngine::new(&vault, &mut store, &config, day())
            .uncomplete(&done)
            .unwrap();

        assert_eq!(vault.read_document("Plan.md").unwrap(), original);
    }

    #[test]
    fn batch_accounts_for_children_of_a_failed_section() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([("Plan.md", "## Sprint #task\n- one\n- two")]);
        let mut store = scanned(&vault, &config, "Plan.md");
        let items = store.tasks();
        assert_eq!(items.len(), 3);

        vault.put("Plan.md", "## Sprint #idea\n- one\n- two");
        let outcome = MutationEngine::new(&vault, &mut store, &config, day()).complete_all(&items);

        assert_eq!(outcome.succeeded, 0);
        assert_eq!(outcome.failed, 3);
        assert_eq!(vault.read_document("Plan.md").unwrap(), "## Sprint #idea\n- one\n- two");
    }

    #[test]
    fn batch_counts_children_completed_by_their_section() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([("Plan.md", "## Sprint #task\n- one\n- two")]);
        let mut store = scanned(&vault, &config, "Plan.md");
        let items = store.tasks();

        let outcome = MutationEngine::new(&vault, &mut store, &config, day()).complete_all(&items);

        assert_eq!(outcome.succeeded, 3);
        assert_eq!(outcome.failed, 0);
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn uncomplete_restores_open_task() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([("a.md", "- [x] #task-done @2024-02-02 call Bob")]);
        let mut store = scanned(&vault, &config, "a.md");
        let item = store.completed_tasks(None, &[])[0].clone();

        MutationEngine::new(&vault, &mut store, &config, day())
            .uncomplete(&item)
            .unwrap();
        assert_eq!(vault.read_document("a.md").unwrap(), "- [ ] #task call Bob");
        assert_eq!(store.tasks().len(), 1);
    }

    #[test]
    fn priority_must_be_configured() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([("a.md", "- [ ] #task call Bob")]);
        let mut store = scanned(&vault, &config, "a.md");
        let item = store.tasks()[0].clone();
        let mut engine = MutationEngine::new(&vault, &mut store, &config, day());

        assert!(matches!(
            engine.set_priority_marker(&item, "#urgent", false),
            Err(NotemarkError::Config(_))
        ));
        engine.set_priority_marker(&item, "#p1", false).unwrap();
        assert_eq!(vault.read_document("a.md").unwrap(), "- [ ] #task #p1 call Bob");
        assert_eq!(store.tasks()[0].priority_rank, 1);
    }

    #[test]
    fn remove_marker_requires_presence() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([("a.md", "- [ ] #task #home fix sink")]);
        let mut store = scanned(&vault, &config, "a.md");
        let item = store.tasks()[0].clone();
        let mut engine = MutationEngine::new(&vault, &mut store, &config, day());

        engine.remove_marker(&item, "#home").unwrap();
        assert_eq!(vault.read_document("a.md").unwrap(), "- [ ] #task fix sink");
        assert!(engine.remove_marker(&item, "#home").unwrap_err().is_stale());
    }

    #[test]
    fn unmarked_idea_child_becomes_task() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([("a.md", "# Someday #idea\n- learn piano")]);
        let mut store = scanned(&vault, &config, "a.md");
        let child = store.ideas().into_iter().find(|i| !i.is_section).unwrap();

        MutationEngine::new(&vault, &mut store, &config, day())
            .convert_idea_to_task(&child)
            .unwrap();
        assert_eq!(
            vault.read_document("a.md").unwrap(),
            "# Someday #idea\n- [ ] learn piano #task"
        );
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.ideas().len(), 1);
    }

    #[test]
    fn batch_continues_past_failures() {
        let config = NotemarkConfig::default();
        let vault = InMemoryVault::with_documents([
            ("a.md", "- [ ] #task #home one"),
            ("b.md", "- [ ] #task #home two"),
        ]);
        let mut store = AnnotationStore::new();
        for path in ["a.md", "b.md"] {
            DocumentScanner::new(&vault, &config.markers, day())
                .scan_into(&mut store, path)
                .unwrap();
        }
        let items = store.tasks_in_group("#home");
        vault.put("a.md", "rewritten elsewhere");

        let outcome = MutationEngine::new(&vault, &mut store, &config, day()).complete_all(&items);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.failures[0].locator, "a.md:1");
        assert_eq!(
            vault.read_document("b.md").unwrap(),
            "- [x] #task-done @2024-03-01 #home two"
        );
    }
}
