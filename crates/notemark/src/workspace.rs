use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE_NAME, NotemarkConfig};
use crate::error::NotemarkError;

pub const DOT_DIR_NAME: &str = ".notemark";

/// Canonical paths for a notemark vault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultPaths {
    root: PathBuf,
    dot_notemark: PathBuf,
}

impl VaultPaths {
    pub fn new(root: PathBuf, dot_notemark: PathBuf) -> Self {
        Self { root, dot_notemark }
    }

    /// Returns the vault root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the `.notemark` folder for this vault.
    pub fn dot_notemark(&self) -> &Path {
        &self.dot_notemark
    }

    pub fn config_file(&self) -> PathBuf {
        self.dot_notemark.join(CONFIG_FILE_NAME)
    }

    pub fn load_config(&self) -> Result<NotemarkConfig, NotemarkError> {
        NotemarkConfig::load(&self.dot_notemark)
    }
}

/// Finds the nearest ancestor of `start` holding a `.notemark` folder.
pub fn discover(start: impl AsRef<Path>) -> Result<VaultPaths, NotemarkError> {
    let canonical_start = normalize_start(start.as_ref())?;

    for ancestor in canonical_start.ancestors() {
        let candidate = ancestor.join(DOT_DIR_NAME);
        if candidate.is_dir() {
            return Ok(VaultPaths::new(ancestor.to_path_buf(), candidate));
        }
    }

    Err(NotemarkError::Workspace(format!(
        "no {DOT_DIR_NAME} directory found from {} (run `notemark init`)",
        canonical_start.display()
    )))
}

/// Creates `.notemark/config.yaml` under `root` unless it already exists.
///
/// Returns the vault paths and whether a config file was written.
pub fn init_vault(root: impl AsRef<Path>) -> Result<(VaultPaths, bool), NotemarkError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(NotemarkError::Workspace(format!(
            "vault root {} is not a directory",
            root.display()
        )));
    }
    let root = fs::canonicalize(root)?;
    let dot = root.join(DOT_DIR_NAME);
    fs::create_dir_all(&dot)?;

    let paths = VaultPaths::new(root, dot);
    let config_path = paths.config_file();
    if config_path.exists() {
        return Ok((paths, false));
    }
    fs::write(&config_path, NotemarkConfig::default().to_yaml_string()?)?;
    tracing::info!(path = %config_path.display(), "wrote default config");
    Ok((paths, true))
}

fn normalize_start(start: &Path) -> Result<PathBuf, NotemarkError> {
    let mut cursor = start.to_path_buf();

    // Walk up until a real path exists so not-yet-created notes still resolve.
    while !cursor.exists() {
        if !cursor.pop() {
            return Err(NotemarkError::Workspace(format!(
                "unable to find existing ancestor for {}",
                start.display()
            )));
        }
    }

    if cursor.is_file() {
        cursor = cursor.parent().map(Path::to_path_buf).ok_or_else(|| {
            NotemarkError::Workspace(format!("file path {} has no parent directory", start.display()))
        })?;
    }

    Ok(fs::canonicalize(cursor)?)
}
