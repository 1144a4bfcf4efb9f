use std::env;
use std::path::PathBuf;

use notemark::{AnnotationItem, FilesystemVault, Notebook, ScanSummary, VaultPaths, discover_vault};

use crate::error::{CliError, ExitStatus};
use crate::util::{Verbosity, parse_locator};

pub struct CliSession {
    pub vault_paths: VaultPaths,
    pub notebook: Notebook<FilesystemVault>,
    pub verbosity: Verbosity,
}

impl CliSession {
    pub fn bootstrap(vault_override: Option<String>, verbosity: Verbosity) -> Result<Self, CliError> {
        let start = match vault_override {
            Some(path) => PathBuf::from(path),
            None => env::current_dir()?,
        };
        let vault_paths = discover_vault(&start)?;
        let config = vault_paths.load_config()?;
        let notebook = Notebook::new(FilesystemVault::new(vault_paths.root()), config);

        Ok(Self {
            vault_paths,
            notebook,
            verbosity,
        })
    }

    /// Full vault scan. Unreadable notes are reported on stderr and skipped.
    pub fn refresh(&mut self) -> Result<ScanSummary, CliError> {
        let summary = self.notebook.scan_all()?;
        for failure in &summary.failures {
            eprintln!("warning: skipped {}: {}", failure.path, failure.message);
        }
        Ok(summary)
    }

    /// Looks up the scanned item at a `path:line` locator.
    pub fn item_at(&self, locator: &str) -> Result<AnnotationItem, CliError> {
        let (path, line) = parse_locator(locator)?;
        self.notebook.find_item(&path, line).ok_or_else(|| {
            CliError::new(
                format!("no task, idea or principle at {path}:{}", line + 1),
                ExitStatus::Data,
            )
        })
    }
}
