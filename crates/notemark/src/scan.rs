use chrono::NaiveDate;

use crate::classify::{LineClassifier, OpenScope, RepairKind};
use crate::config::MarkerConfig;
use crate::error::NotemarkError;
use crate::model::{AnnotationItem, DocumentItems, inferred_group_tag};
use crate::recognize::date_stamp_after;
use crate::rewrite::{DocumentLines, apply_repair};
use crate::store::{AnnotationStore, UpdateEvent};
use crate::vault::Vault;

/// Repairs queued for one line during a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Repair {
    pub line: usize,
    pub kinds: Vec<RepairKind>,
}

/// Items and pending repairs from one pass over a document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub items: DocumentItems,
    pub repairs: Vec<Repair>,
}

/// Summary of a published document scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanReport {
    pub path: String,
    pub items: usize,
    pub repaired_lines: usize,
}

/// Runs the classifier over every line of `text`. No I/O.
pub fn scan_text(
    path: &str,
    text: &str,
    created_at: i64,
    markers: &MarkerConfig,
) -> ScanOutcome {
    let group_tag = inferred_group_tag(path);
    let lines = DocumentLines::parse(text);
    let mut classifier = LineClassifier::new(markers);
    let mut outcome = ScanOutcome::default();

    for (idx, line) in lines.iter().enumerate() {
        let step = classifier.classify(idx, line);
        attach_children(&mut outcome.items, step.closed);

        if !step.repairs.is_empty() {
            outcome.repairs.push(Repair {
                line: idx,
                kinds: step.repairs,
            });
        }

        let Some(classified) = step.item else {
            continue;
        };
        let completed_on = classified
            .markers
            .first(&markers.completed)
            .and_then(|marker| date_stamp_after(line, marker.range.end))
            .map(|(date, _)| date);
        let tokens = classified.markers.tokens();

        outcome.items.push(AnnotationItem {
            path: path.to_string(),
            line: idx,
            raw_text: line.trim().to_string(),
            category: classified.category,
            has_checkbox: classified.has_checkbox,
            priority_rank: markers.priority_rank(&tokens),
            markers: tokens,
            created_at,
            is_section: classified.section_level.is_some(),
            section_level: classified.section_level,
            parent_line: classified.parent_line,
            child_lines: Vec::new(),
            inferred_group_tag: group_tag.clone(),
            completed_on,
        });
    }
    attach_children(&mut outcome.items, classifier.finish());

    outcome
}

fn attach_children(items: &mut DocumentItems, closed: Vec<OpenScope>) {
    for scope in closed {
        if let Some(section) = items.at_line_mut(scope.line) {
            section.child_lines = scope.children;
        }
    }
}

/// Applies every queued repair to `text` in one pass.
pub fn apply_repairs(
    text: &str,
    repairs: &[Repair],
    markers: &MarkerConfig,
    today: NaiveDate,
) -> String {
    let mut lines = DocumentLines::parse(text);
    for repair in repairs {
        let Some(original) = lines.get(repair.line) else {
            continue;
        };
        let mut rewritten = original.to_string();
        for kind in &repair.kinds {
            rewritten = apply_repair(&rewritten, *kind, markers, today);
        }
        lines.set(repair.line, &rewritten);
    }
    lines.join()
}

/// Scans one document from the vault, writes back repairs, and publishes to the store.
pub struct DocumentScanner<'a, V: Vault + ?Sized> {
    vault: &'a V,
    markers: &'a MarkerConfig,
    today: NaiveDate,
}

impl<'a, V: Vault + ?Sized> DocumentScanner<'a, V> {
    pub fn new(vault: &'a V, markers: &'a MarkerConfig, today: NaiveDate) -> Self {
        Self {
            vault,
            markers,
            today,
        }
    }

    /// Reads, classifies and repairs `path` without touching any store.
    pub fn scan(&self, path: &str) -> Result<(DocumentItems, usize), NotemarkError> {
        let text = self
            .vault
            .read_document(path)
            .map_err(|err| err.context(format!("scan {path}")))?;
        let created_at = self.vault.document_metadata(path)?.modified_ms;

        tracing::debug!(path, "scanning document");
        let outcome = scan_text(path, &text, created_at, self.markers);
        if outcome.repairs.is_empty() {
            return Ok((outcome.items, 0));
        }

        let repaired = apply_repairs(&text, &outcome.repairs, self.markers, self.today);
        tracing::warn!(
            path,
            lines = outcome.repairs.len(),
            "repairing checkbox/marker disagreement"
        );
        self.vault.write_document(path, &repaired)?;

        // Publish what was written so raw_text matches the document on disk.
        let settled = scan_text(path, &repaired, created_at, self.markers);
        if !settled.repairs.is_empty() {
            tracing::warn!(path, "repairs did not settle in one pass");
        }
        Ok((settled.items, outcome.repairs.len()))
    }

    /// Scans `path`, replaces its store entry and notifies observers afterwards.
    pub fn scan_into(
        &self,
        store: &mut AnnotationStore,
        path: &str,
    ) -> Result<ScanReport, NotemarkError> {
        let (items, repaired_lines) = self.scan(path)?;
        let report = ScanReport {
            path: path.to_string(),
            items: items.len(),
            repaired_lines,
        };
        store.replace(path, items);
        store.notify(&UpdateEvent::Scanned(path.to_string()));
        Ok(report)
    }
}
