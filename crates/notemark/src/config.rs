use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::NotemarkError;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Marker vocabulary recognized by the scanner and written by the mutation engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub task: String,
    pub completed: String,
    pub idea: String,
    pub principle: String,
    /// Ordered from most to least urgent; rank is the 1-based position.
    pub priorities: Vec<String>,
    pub focus: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            task: "#task".to_string(),
            completed: "#task-done".to_string(),
            idea: "#idea".to_string(),
            principle: "#principle".to_string(),
            priorities: vec!["#p1".to_string(), "#p2".to_string(), "#p3".to_string()],
            focus: "#focus".to_string(),
        }
    }
}

impl MarkerConfig {
    /// Rank assigned to items without any priority marker.
    pub fn unprioritized_rank(&self) -> u8 {
        u8::try_from(self.priorities.len() + 1).unwrap_or(u8::MAX)
    }

    pub fn priority_rank<S: AsRef<str>>(&self, markers: &[S]) -> u8 {
        markers
            .iter()
            .filter_map(|marker| {
                self.priorities
                    .iter()
                    .position(|p| p == marker.as_ref())
                    .map(|idx| u8::try_from(idx + 1).unwrap_or(u8::MAX))
            })
            .min()
            .unwrap_or_else(|| self.unprioritized_rank())
    }

    pub fn is_priority(&self, marker: &str) -> bool {
        self.priorities.iter().any(|p| p == marker)
    }

    /// Category, priority and focus markers; everything else can name a group.
    pub fn is_structural(&self, marker: &str) -> bool {
        marker == self.task
            || marker == self.completed
            || marker == self.idea
            || marker == self.principle
            || marker == self.focus
            || self.is_priority(marker)
    }

    fn validate(&self) -> Result<(), NotemarkError> {
        let mut all: Vec<&str> = vec![
            self.task.as_str(),
            self.completed.as_str(),
            self.idea.as_str(),
            self.principle.as_str(),
            self.focus.as_str(),
        ];
        all.extend(self.priorities.iter().map(String::as_str));

        for marker in &all {
            let body = marker.strip_prefix('#').ok_or_else(|| {
                NotemarkError::Config(format!("marker '{marker}' must start with '#'"))
            })?;
            if body.is_empty()
                || !body
                    .chars()
                    .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-')
            {
                return Err(NotemarkError::Config(format!(
                    "marker '{marker}' must be '#' followed by word characters or hyphens"
                )));
            }
        }

        let category = [&self.task, &self.completed, &self.idea, &self.principle];
        for (idx, marker) in category.iter().enumerate() {
            if category[idx + 1..].contains(marker) {
                return Err(NotemarkError::Config(format!(
                    "category marker '{marker}' is assigned to more than one category"
                )));
            }
        }
        Ok(())
    }
}

/// Vault-level settings loaded from `.notemark/config.yaml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotemarkConfig {
    pub markers: MarkerConfig,
    /// Vault-relative document receiving normalized copies of completed items.
    pub archive_path: String,
    /// Documents left out of the completed-task listing.
    pub excluded_paths: Vec<String>,
    pub debounce_ms: u64,
    pub completed_limit: Option<usize>,
}

impl Default for NotemarkConfig {
    fn default() -> Self {
        Self {
            markers: MarkerConfig::default(),
            archive_path: "Archive/Completed.md".to_string(),
            excluded_paths: Vec::new(),
            debounce_ms: 100,
            completed_limit: None,
        }
    }
}

impl NotemarkConfig {
    /// Loads the config file inside `dot_dir`, falling back to defaults when absent.
    pub fn load(dot_dir: &Path) -> Result<Self, NotemarkError> {
        let path = dot_dir.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Self::from_yaml_str(&content)
            .map_err(|err| err.context(format!("failed to load {}", path.display())))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, NotemarkError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: NotemarkConfig = serde_yaml::from_str(content)
            .map_err(|err| NotemarkError::Config(err.to_string()))?;
        config.markers.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, NotemarkError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Archive document plus the configured exclusions.
    pub fn completed_exclusions(&self) -> Vec<String> {
        let mut out = self.excluded_paths.clone();
        if !out.contains(&self.archive_path) {
            out.push(self.archive_path.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = NotemarkConfig::from_yaml_str("debounce_ms: 250\nmarkers:\n  idea: '#spark'\n")
            .expect("config parses");
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.markers.idea, "#spark");
        assert_eq!(config.markers.task, "#task");
        assert_eq!(config.archive_path, "Archive/Completed.md");
    }

    #[test]
    fn rejects_marker_without_hash() {
        let err = NotemarkConfig::from_yaml_str("markers:\n  task: todo\n").unwrap_err();
        assert!(matches!(err, NotemarkError::Config(msg) if msg.contains("must start with '#'")));
    }

    #[test]
    fn rejects_shared_category_marker() {
        let err =
            NotemarkConfig::from_yaml_str("markers:\n  idea: '#task'\n").unwrap_err();
        assert!(matches!(err, NotemarkError::Config(_)));
    }

    #[test]
    fn priority_rank_takes_most_urgent_marker() {
        let markers = MarkerConfig::default();
        assert_eq!(markers.priority_rank(&["#p3", "#p1"]), 1);
        assert_eq!(markers.priority_rank(&["#home"]), 4);
        assert!(markers.is_structural("#focus"));
        assert!(!markers.is_structural("#home"));
    }

    #[test]
    fn exclusions_include_archive() {
        let config = NotemarkConfig {
            excluded_paths: vec!["Old.md".into()],
            ..Default::default()
        };
        assert_eq!(
            config.completed_exclusions(),
            vec!["Old.md".to_string(), "Archive/Completed.md".to_string()]
        );
    }
}
