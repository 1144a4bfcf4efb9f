use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Document change reported by the host (or the filesystem watcher).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    Modified(String),
    Created(String),
    Deleted(String),
    Renamed { from: String, to: String },
}

/// Work the scheduler decided is due.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScheduledAction {
    Scan(String),
    Remove(String),
}

#[derive(Clone, Copy, Debug)]
struct Window {
    closes_at: Instant,
    trailing: bool,
}

/// Per-path debounce queue with leading-edge and trailing scans.
///
/// The first change to an idle path is scanned right away; further changes inside
/// the window collapse into one scan when the window closes. Every change pushes
/// the window out again. Time is always supplied by the caller.
#[derive(Debug)]
pub struct RescanScheduler {
    window: Duration,
    pending: BTreeMap<String, Window>,
}

impl RescanScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Feeds one change in; returns what must happen immediately.
    pub fn on_event(&mut self, event: ChangeEvent, now: Instant) -> Vec<ScheduledAction> {
        match event {
            ChangeEvent::Modified(path) | ChangeEvent::Created(path) => {
                self.touch(path, now, true).into_iter().collect()
            }
            ChangeEvent::Deleted(path) => {
                self.pending.remove(&path);
                vec![ScheduledAction::Remove(path)]
            }
            ChangeEvent::Renamed { from, to } => {
                self.pending.remove(&from);
                self.touch(to, now, false);
                vec![ScheduledAction::Remove(from)]
            }
        }
    }

    /// Returns trailing scans whose window has closed and forgets idle paths.
    pub fn poll(&mut self, now: Instant) -> Vec<ScheduledAction> {
        let mut due = Vec::new();
        self.pending.retain(|path, window| {
            if now < window.closes_at {
                return true;
            }
            if window.trailing {
                due.push(ScheduledAction::Scan(path.clone()));
            }
            false
        });
        due
    }

    /// Earliest instant at which [`poll`](Self::poll) has something to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|w| w.closes_at).min()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    fn touch(&mut self, path: String, now: Instant, leading: bool) -> Option<ScheduledAction> {
        let closes_at = now + self.window;
        match self.pending.get_mut(&path) {
            Some(window) if now < window.closes_at => {
                window.closes_at = closes_at;
                window.trailing = true;
                None
            }
            _ => {
                self.pending.insert(
                    path.clone(),
                    Window {
                        closes_at,
                        trailing: !leading,
                    },
                );
                leading.then_some(ScheduledAction::Scan(path))
            }
        }
    }
}

impl Default for RescanScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
