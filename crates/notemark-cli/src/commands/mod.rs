use notemark::{BatchOutcome, GroupInfo, MutationReport, ScanSummary};
use serde::Serialize;

use crate::error::ExitStatus;

pub mod group;
pub mod init;
pub mod list;
pub mod mutate;
pub mod scan;
pub mod watch;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandResult {
    VaultInitialized {
        root: String,
        dot_notemark: String,
        created: bool,
    },
    Scanned {
        summary: ScanSummary,
    },
    ItemList {
        category: String,
        items: Vec<list::ItemSummary>,
    },
    GroupList {
        groups: Vec<GroupInfo>,
    },
    Mutated {
        action: String,
        report: MutationReport,
    },
    Batch {
        action: String,
        marker: String,
        outcome: BatchOutcome,
    },
    WatchStopped {
        events: usize,
    },
}

impl CommandResult {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            CommandResult::Scanned { summary } => {
                if summary.failures.is_empty() {
                    ExitStatus::Ok
                } else {
                    ExitStatus::Data
                }
            }
            CommandResult::Batch { outcome, .. } => {
                if outcome.failed == 0 {
                    ExitStatus::Ok
                } else {
                    ExitStatus::Data
                }
            }
            _ => ExitStatus::Ok,
        }
    }
}
