use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ignore::WalkBuilder;
use parking_lot::Mutex;

use crate::error::NotemarkError;

/// Metadata the scanner needs about a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Last modification time, unix milliseconds.
    pub modified_ms: i64,
}

/// Host storage the engine reads notes from and writes rewrites back to.
///
/// Paths are vault-relative and use forward slashes.
pub trait Vault: Send + Sync {
    fn read_document(&self, path: &str) -> Result<String, NotemarkError>;
    fn write_document(&self, path: &str, text: &str) -> Result<(), NotemarkError>;
    fn create_document(&self, path: &str, initial: &str) -> Result<(), NotemarkError>;
    fn ensure_folder(&self, path: &str) -> Result<(), NotemarkError>;
    fn enumerate_documents(&self) -> Result<Vec<String>, NotemarkError>;
    fn document_metadata(&self, path: &str) -> Result<DocumentMetadata, NotemarkError>;
    fn exists(&self, path: &str) -> bool;
}

/// Parent folder of a vault-relative path, if it has one.
pub fn parent_folder(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(dir, _)| dir).filter(|dir| !dir.is_empty())
}

/// Vault backed by a directory of Markdown files.
#[derive(Clone, Debug)]
pub struct FilesystemVault {
    root: PathBuf,
}

impl FilesystemVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a vault-relative path, refusing anything that escapes the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, NotemarkError> {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return Err(NotemarkError::Storage(format!(
                "document path '{path}' must be vault-relative"
            )));
        }
        if candidate
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(NotemarkError::Storage(format!(
                "document path '{path}' must not traverse parent directories (..)"
            )));
        }
        Ok(self.root.join(candidate))
    }

    /// Vault-relative form of an absolute path inside the root.
    pub fn relative(&self, absolute: &Path) -> Option<String> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        Some(relative.to_string_lossy().replace('\\', "/"))
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> NotemarkError {
    NotemarkError::Storage(format!("failed to {action} {}: {err}", path.display()))
}

impl Vault for FilesystemVault {
    fn read_document(&self, path: &str) -> Result<String, NotemarkError> {
        let absolute = self.resolve(path)?;
        fs::read_to_string(&absolute).map_err(|err| storage_error("read", &absolute, err))
    }

    fn write_document(&self, path: &str, text: &str) -> Result<(), NotemarkError> {
        let absolute = self.resolve(path)?;
        fs::write(&absolute, text).map_err(|err| storage_error("write", &absolute, err))
    }

    fn create_document(&self, path: &str, initial: &str) -> Result<(), NotemarkError> {
        let absolute = self.resolve(path)?;
        if absolute.exists() {
            return Err(NotemarkError::Storage(format!(
                "document {} already exists",
                absolute.display()
            )));
        }
        fs::write(&absolute, initial).map_err(|err| storage_error("create", &absolute, err))
    }

    fn ensure_folder(&self, path: &str) -> Result<(), NotemarkError> {
        let absolute = self.resolve(path)?;
        fs::create_dir_all(&absolute).map_err(|err| storage_error("create folder", &absolute, err))
    }

    fn enumerate_documents(&self) -> Result<Vec<String>, NotemarkError> {
        let walker = WalkBuilder::new(&self.root)
            .hidden(true) // skip hidden, including .notemark
            .ignore(true)
            .git_ignore(true)
            .build();

        let mut out = Vec::new();
        for result in walker {
            match result {
                Ok(entry) => {
                    let path = entry.path();
                    if !path.is_file() || path.extension().is_none_or(|ext| ext != "md") {
                        continue;
                    }
                    if let Some(relative) = self.relative(path) {
                        out.push(relative);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable vault entry");
                }
            }
        }
        out.sort();
        Ok(out)
    }

    fn document_metadata(&self, path: &str) -> Result<DocumentMetadata, NotemarkError> {
        let absolute = self.resolve(path)?;
        let metadata =
            fs::metadata(&absolute).map_err(|err| storage_error("stat", &absolute, err))?;
        let modified = metadata
            .modified()
            .map_err(|err| storage_error("stat", &absolute, err))?;
        Ok(DocumentMetadata {
            modified_ms: system_time_to_unix_ms(modified),
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }
}

fn system_time_to_unix_ms(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[derive(Default)]
struct MemoryState {
    documents: BTreeMap<String, (String, i64)>,
    folders: BTreeSet<String>,
    tick: i64,
    writes: usize,
}

/// Vault held entirely in memory; every write bumps a logical modification clock.
#[derive(Default)]
pub struct InMemoryVault {
    state: Mutex<MemoryState>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I, P, T>(documents: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: Into<String>,
    {
        let vault = Self::new();
        {
            let mut state = vault.state.lock();
            for (path, text) in documents {
                state.tick += 1;
                let tick = state.tick;
                state.documents.insert(path.into(), (text.into(), tick));
            }
        }
        vault
    }

    /// Simulates an edit made outside the engine.
    pub fn put(&self, path: &str, text: &str) {
        let mut state = self.state.lock();
        state.tick += 1;
        let tick = state.tick;
        state
            .documents
            .insert(path.to_string(), (text.to_string(), tick));
    }

    pub fn remove(&self, path: &str) -> bool {
        self.state.lock().documents.remove(path).is_some()
    }

    pub fn rename(&self, from: &str, to: &str) -> bool {
        let mut state = self.state.lock();
        match state.documents.remove(from) {
            Some(entry) => {
                state.documents.insert(to.to_string(), entry);
                true
            }
            None => false,
        }
    }

    pub fn has_folder(&self, path: &str) -> bool {
        self.state.lock().folders.contains(path)
    }

    /// Number of writes performed through the [`Vault`] trait.
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }
}

impl Vault for InMemoryVault {
    fn read_document(&self, path: &str) -> Result<String, NotemarkError> {
        self.state
            .lock()
            .documents
            .get(path)
            .map(|(text, _)| text.clone())
            .ok_or_else(|| NotemarkError::Storage(format!("document {path} does not exist")))
    }

    fn write_document(&self, path: &str, text: &str) -> Result<(), NotemarkError> {
        let mut state = self.state.lock();
        state.tick += 1;
        state.writes += 1;
        let tick = state.tick;
        state
            .documents
            .insert(path.to_string(), (text.to_string(), tick));
        Ok(())
    }

    fn create_document(&self, path: &str, initial: &str) -> Result<(), NotemarkError> {
        let mut state = self.state.lock();
        if state.documents.contains_key(path) {
            return Err(NotemarkError::Storage(format!(
                "document {path} already exists"
            )));
        }
        if let Some(folder) = parent_folder(path) {
            if !state.folders.contains(folder) {
                return Err(NotemarkError::Storage(format!(
                    "folder {folder} does not exist"
                )));
            }
        }
        state.tick += 1;
        state.writes += 1;
        let tick = state.tick;
        state
            .documents
            .insert(path.to_string(), (initial.to_string(), tick));
        Ok(())
    }

    fn ensure_folder(&self, path: &str) -> Result<(), NotemarkError> {
        let mut state = self.state.lock();
        let mut prefix = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            state.folders.insert(prefix.clone());
        }
        Ok(())
    }

    fn enumerate_documents(&self) -> Result<Vec<String>, NotemarkError> {
        Ok(self.state.lock().documents.keys().cloned().collect())
    }

    fn document_metadata(&self, path: &str) -> Result<DocumentMetadata, NotemarkError> {
        self.state
            .lock()
            .documents
            .get(path)
            .map(|(_, tick)| DocumentMetadata { modified_ms: *tick })
            .ok_or_else(|| NotemarkError::Storage(format!("document {path} does not exist")))
    }

    fn exists(&self, path: &str) -> bool {
        self.state.lock().documents.contains_key(path)
    }
}

impl<V> Vault for Arc<V>
where
    V: Vault + ?Sized,
{
    fn read_document(&self, path: &str) -> Result<String, NotemarkError> {
        (**self).read_document(path)
    }

    fn write_document(&self, path: &str, text: &str) -> Result<(), NotemarkError> {
        (**self).write_document(path, text)
    }

    fn create_document(&self, path: &str, initial: &str) -> Result<(), NotemarkError> {
        (**self).create_document(path, initial)
    }

    fn ensure_folder(&self, path: &str) -> Result<(), NotemarkError> {
        (**self).ensure_folder(path)
    }

    fn enumerate_documents(&self) -> Result<Vec<String>, NotemarkError> {
        (**self).enumerate_documents()
    }

    fn document_metadata(&self, path: &str) -> Result<DocumentMetadata, NotemarkError> {
        (**self).document_metadata(path)
    }

    fn exists(&self, path: &str) -> bool {
        (**self).exists(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn filesystem_vault_enumerates_markdown_only() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("Projects")).unwrap();
        fs::create_dir_all(root.join(".notemark")).unwrap();
        fs::write(root.join("Inbox.md"), "- [ ] #task a").unwrap();
        fs::write(root.join("Projects/Home.md"), "#idea b").unwrap();
        fs::write(root.join("Projects/image.png"), "png").unwrap();
        fs::write(root.join(".notemark/hidden.md"), "#task hidden").unwrap();

        let vault = FilesystemVault::new(root);
        assert_eq!(
            vault.enumerate_documents().unwrap(),
            vec!["Inbox.md".to_string(), "Projects/Home.md".to_string()]
        );
    }

    #[test]
    fn filesystem_vault_rejects_escaping_paths() {
        let temp = tempdir().unwrap();
        let vault = FilesystemVault::new(temp.path());
        let err = vault.read_document("../secret.md").unwrap_err();
        assert!(matches!(err, NotemarkError::Storage(msg) if msg.contains("parent directories")));
        assert!(!vault.exists("/etc/passwd"));
    }

    #[test]
    fn filesystem_vault_create_refuses_overwrite() {
        let temp = tempdir().unwrap();
        let vault = FilesystemVault::new(temp.path());
        vault.ensure_folder("Archive").unwrap();
        vault.create_document("Archive/Done.md", "").unwrap();
        assert!(vault.exists("Archive/Done.md"));
        assert!(vault.create_document("Archive/Done.md", "").is_err());
    }

    #[test]
    fn memory_vault_tracks_writes_and_folders() {
        let vault = InMemoryVault::with_documents([("a.md", "one")]);
        let before = vault.document_metadata("a.md").unwrap();
        vault.write_document("a.md", "two").unwrap();
        let after = vault.document_metadata("a.md").unwrap();
        assert!(after.modified_ms > before.modified_ms);
        assert_eq!(vault.write_count(), 1);

        assert!(vault.create_document("x/y.md", "").is_err());
        vault.ensure_folder("x").unwrap();
        vault.create_document("x/y.md", "").unwrap();
        assert!(vault.has_folder("x"));
    }

    #[test]
    fn parent_folder_of_paths() {
        assert_eq!(parent_folder("Archive/Done.md"), Some("Archive"));
        assert_eq!(parent_folder("Done.md"), None);
    }
}
