use std::time::{Duration, Instant};

use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::config::NotemarkConfig;
use crate::error::NotemarkError;
use crate::model::{AnnotationItem, GroupInfo};
use crate::mutation::{BatchOutcome, MutationEngine, MutationReport};
use crate::scan::{DocumentScanner, ScanReport};
use crate::schedule::{ChangeEvent, RescanScheduler, ScheduledAction};
use crate::store::{AnnotationStore, SubscriptionId, UpdateEvent};
use crate::vault::Vault;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    pub path: String,
    pub message: String,
}

/// Totals from [`Notebook::scan_all`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub documents: usize,
    pub items: usize,
    pub repaired_lines: usize,
    pub failures: Vec<ScanFailure>,
}

/// Composition root owning the store, the rescan queue and the vault handle.
pub struct Notebook<V: Vault> {
    vault: V,
    config: NotemarkConfig,
    clock: Box<dyn Clock>,
    store: AnnotationStore,
    scheduler: RescanScheduler,
}

impl<V: Vault> Notebook<V> {
    pub fn new(vault: V, config: NotemarkConfig) -> Self {
        let scheduler = RescanScheduler::new(Duration::from_millis(config.debounce_ms));
        Self {
            vault,
            config,
            clock: Box::new(SystemClock),
            store: AnnotationStore::new(),
            scheduler,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn config(&self) -> &NotemarkConfig {
        &self.config
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    /// Rescans every document. Failures are logged per document and never abort the pass.
    pub fn scan_all(&mut self) -> Result<ScanSummary, NotemarkError> {
        let paths = self.vault.enumerate_documents()?;
        tracing::debug!(documents = paths.len(), "scanning vault");

        let mut summary = ScanSummary::default();
        for path in &paths {
            match self.scan_one(path) {
                Ok(report) => {
                    summary.documents += 1;
                    summary.items += report.items;
                    summary.repaired_lines += report.repaired_lines;
                }
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "failed to scan document");
                    summary.failures.push(ScanFailure {
                        path: path.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let vanished: Vec<String> = self
            .store
            .paths()
            .filter(|cached| !paths.iter().any(|p| p.as_str() == *cached))
            .map(str::to_string)
            .collect();
        for path in vanished {
            self.store.remove(&path);
        }

        self.store.notify(&UpdateEvent::Rebuilt);
        Ok(summary)
    }

    pub fn scan_one(&mut self, path: &str) -> Result<ScanReport, NotemarkError> {
        let today = self.clock.today();
        DocumentScanner::new(&self.vault, &self.config.markers, today)
            .scan_into(&mut self.store, path)
    }

    pub fn tasks(&self) -> Vec<AnnotationItem> {
        self.store.tasks()
    }

    /// Newest first; `None` falls back to the configured limit. The archive is excluded.
    pub fn completed_tasks(&self, limit: Option<usize>) -> Vec<AnnotationItem> {
        self.store.completed_tasks(
            limit.or(self.config.completed_limit),
            &self.config.completed_exclusions(),
        )
    }

    pub fn ideas(&self) -> Vec<AnnotationItem> {
        self.store.ideas()
    }

    pub fn principles(&self) -> Vec<AnnotationItem> {
        self.store.principles(None, &self.config.completed_exclusions())
    }

    pub fn groups(&self) -> Vec<GroupInfo> {
        self.store.groups(&self.config.markers)
    }

    pub fn tasks_in_group(&self, marker: &str) -> Vec<AnnotationItem> {
        self.store.tasks_in_group(marker)
    }

    pub fn find_item(&self, path: &str, line: usize) -> Option<AnnotationItem> {
        self.store.find(path, line).cloned()
    }

    pub fn on_updated<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&UpdateEvent) + 'static,
    {
        self.store.on_updated(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// Feeds a document change through the debounce queue and runs whatever is due now.
    pub fn handle_event(&mut self, event: ChangeEvent, now: Instant) -> Vec<ScheduledAction> {
        let actions = self.scheduler.on_event(event, now);
        self.run(&actions);
        actions
    }

    /// Runs trailing scans whose debounce window has closed.
    pub fn poll(&mut self, now: Instant) -> Vec<ScheduledAction> {
        let actions = self.scheduler.poll(now);
        self.run(&actions);
        actions
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn complete(&mut self, item: &AnnotationItem) -> Result<MutationReport, NotemarkError> {
        self.engine().complete(item)
    }

    pub fn uncomplete(&mut self, item: &AnnotationItem) -> Result<MutationReport, NotemarkError> {
        self.engine().uncomplete(item)
    }

    pub fn set_priority_marker(
        &mut self,
        item: &AnnotationItem,
        priority: &str,
        focus: bool,
    ) -> Result<MutationReport, NotemarkError> {
        self.engine().set_priority_marker(item, priority, focus)
    }

    pub fn remove_marker(
        &mut self,
        item: &AnnotationItem,
        marker: &str,
    ) -> Result<MutationReport, NotemarkError> {
        self.engine().remove_marker(item, marker)
    }

    pub fn convert_idea_to_task(
        &mut self,
        item: &AnnotationItem,
    ) -> Result<MutationReport, NotemarkError> {
        self.engine().convert_idea_to_task(item)
    }

    pub fn complete_all(&mut self, items: &[AnnotationItem]) -> BatchOutcome {
        self.engine().complete_all(items)
    }

    pub fn uncomplete_all(&mut self, items: &[AnnotationItem]) -> BatchOutcome {
        self.engine().uncomplete_all(items)
    }

    /// Completes every open task in the group named by `marker`.
    pub fn complete_group(&mut self, marker: &str) -> BatchOutcome {
        let items = self.store.tasks_in_group(marker);
        self.complete_all(&items)
    }

    pub fn set_group_priority(&mut self, marker: &str, priority: &str, focus: bool) -> BatchOutcome {
        let items = self.store.tasks_in_group(marker);
        self.engine().set_priority_all(&items, priority, focus)
    }

    fn engine(&mut self) -> MutationEngine<'_, V> {
        let today = self.clock.today();
        MutationEngine::new(&self.vault, &mut self.store, &self.config, today)
    }

    fn run(&mut self, actions: &[ScheduledAction]) {
        for action in actions {
            match action {
                ScheduledAction::Scan(path) => {
                    if !self.vault.exists(path) {
                        tracing::debug!(path = %path, "skipping scan of missing document");
                        continue;
                    }
                    if let Err(err) = self.scan_one(path) {
                        tracing::warn!(path = %path, error = %err, "rescan failed");
                    }
                }
                ScheduledAction::Remove(path) => {
                    self.store.remove(path);
                    self.store.notify(&UpdateEvent::Removed(path.clone()));
                }
            }
        }
    }
}
