pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod mutation;
pub mod notebook;
pub mod recognize;
pub mod rewrite;
pub mod scan;
pub mod schedule;
pub mod store;
pub mod vault;
pub mod watch;
pub mod workspace;

pub use classify::{LineClassifier, LineStep, RepairKind};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{MarkerConfig, NotemarkConfig};
pub use error::NotemarkError;
pub use model::{AnnotationItem, Category, DocumentItems, GroupInfo, ScopeKind};
pub use mutation::{BatchFailure, BatchOutcome, MutationEngine, MutationReport};
pub use notebook::{Notebook, ScanFailure, ScanSummary};
pub use scan::{DocumentScanner, ScanOutcome, ScanReport, scan_text};
pub use schedule::{ChangeEvent, RescanScheduler, ScheduledAction};
pub use store::{AnnotationStore, SubscriptionId, UpdateEvent};
pub use vault::{DocumentMetadata, FilesystemVault, InMemoryVault, Vault};
pub use watch::VaultWatcher;
pub use workspace::{VaultPaths, discover as discover_vault, init_vault};
