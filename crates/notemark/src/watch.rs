use std::path::{Component, Path};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::NotemarkError;
use crate::schedule::ChangeEvent;

/// Recursive filesystem watcher producing vault-relative [`ChangeEvent`]s.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<ChangeEvent>,
}

impl VaultWatcher {
    pub fn start(root: &Path) -> Result<Self, NotemarkError> {
        let (tx, rx) = mpsc::channel();
        let watch_root = root.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for change in translate(&watch_root, &event) {
                        if tx.send(change).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => tracing::warn!(error = %err, "watch error"),
            },
            Config::default(),
        )
        .map_err(|err| NotemarkError::Storage(format!("failed to start watcher: {err}")))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|err| {
                NotemarkError::Storage(format!("failed to watch {}: {err}", root.display()))
            })?;

        Ok(Self {
            _watcher: watcher,
            events: rx,
        })
    }

    /// Waits up to `timeout` for the next change. `Ok(None)` on timeout.
    pub fn next_event(&self, timeout: Duration) -> Result<Option<ChangeEvent>, NotemarkError> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(NotemarkError::Storage("watcher stopped".to_string()))
            }
        }
    }
}

/// Maps one notify event onto change events for Markdown documents under `root`.
pub fn translate(root: &Path, event: &Event) -> Vec<ChangeEvent> {
    let docs: Vec<Option<String>> = event.paths.iter().map(|p| document_path(root, p)).collect();

    match event.kind {
        EventKind::Create(_) => docs.into_iter().flatten().map(ChangeEvent::Created).collect(),
        EventKind::Remove(_) => docs.into_iter().flatten().map(ChangeEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if docs.len() == 2 => {
            let mut pair = docs.into_iter();
            match (pair.next().flatten(), pair.next().flatten()) {
                (Some(from), Some(to)) => vec![ChangeEvent::Renamed { from, to }],
                (Some(from), None) => vec![ChangeEvent::Deleted(from)],
                (None, Some(to)) => vec![ChangeEvent::Created(to)],
                (None, None) => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            docs.into_iter().flatten().map(ChangeEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            docs.into_iter().flatten().map(ChangeEvent::Created).collect()
        }
        // Platforms that report each side of a rename separately.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .zip(docs)
            .filter_map(|(absolute, doc)| {
                let doc = doc?;
                Some(if absolute.exists() {
                    ChangeEvent::Created(doc)
                } else {
                    ChangeEvent::Deleted(doc)
                })
            })
            .collect(),
        EventKind::Modify(_) => docs.into_iter().flatten().map(ChangeEvent::Modified).collect(),
        _ => Vec::new(),
    }
}

fn document_path(root: &Path, path: &Path) -> Option<String> {
    if path.extension().is_none_or(|ext| ext != "md") {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?;
    let hidden = relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    });
    if hidden {
        return None;
    }
    Some(join_forward(relative))
}

fn join_forward(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
