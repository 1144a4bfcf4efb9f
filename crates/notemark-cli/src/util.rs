use std::path::{Component, Path};

use crate::error::{CliError, ExitStatus};

#[derive(Clone, Copy, Debug, Default)]
pub struct Verbosity {
    pub json: bool,
    pub verbose: bool,
}

/// Parses `path:line` (1-based line) into a vault-relative path and a 0-based line index.
pub fn parse_locator(value: &str) -> Result<(String, usize), CliError> {
    let trimmed = value.trim();
    let Some((path, line)) = trimmed.rsplit_once(':') else {
        return Err(CliError::new(
            format!("item locator '{trimmed}' must look like path/to/note.md:LINE"),
            ExitStatus::Usage,
        ));
    };

    let line: usize = line.parse().map_err(|_| {
        CliError::new(
            format!("item locator '{trimmed}' has a non-numeric line"),
            ExitStatus::Usage,
        )
    })?;
    if line == 0 {
        return Err(CliError::new(
            format!("item locator '{trimmed}' must use 1-based line numbers"),
            ExitStatus::Usage,
        ));
    }

    validate_relative(path)?;
    Ok((path.replace('\\', "/"), line - 1))
}

fn validate_relative(path: &str) -> Result<(), CliError> {
    if path.is_empty() {
        return Err(CliError::new("note path must not be empty", ExitStatus::Usage));
    }
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Err(CliError::new(
            format!("note path '{path}' must be vault-relative"),
            ExitStatus::Usage,
        ));
    }
    if candidate
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(CliError::new(
            format!("note path '{path}' must not traverse parent directories (..)"),
            ExitStatus::Usage,
        ));
    }
    Ok(())
}

/// Accepts `home` or `#home` and returns the `#`-prefixed form.
pub fn normalize_marker(value: &str) -> Result<String, CliError> {
    let trimmed = value.trim();
    let body = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if body.is_empty()
        || !body
            .chars()
            .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(CliError::new(
            format!("marker '{trimmed}' must be '#' followed by letters, digits, '_' or '-'"),
            ExitStatus::Usage,
        ));
    }
    Ok(format!("#{body}"))
}
