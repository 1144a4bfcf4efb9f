use std::env;
use std::fs;
use std::path::PathBuf;

use clap::{Arg, ArgMatches, Command};
use notemark::init_vault;

use crate::commands::CommandResult;
use crate::error::{CliError, ExitStatus};

pub fn command() -> Command {
    Command::new("init")
        .about("Create a .notemark folder with the default config")
        .arg(
            Arg::new("path")
                .value_name("PATH")
                .help("Vault root to initialize. Defaults to the current directory."),
        )
}

/// Runs before vault discovery, since the vault may not exist yet.
pub fn run(vault_override: Option<String>, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let positional = matches.get_one::<String>("path").cloned();
    let target = match vault_override.or(positional) {
        Some(raw) => PathBuf::from(raw),
        None => env::current_dir()?,
    };

    if target.exists() && !target.is_dir() {
        return Err(CliError::new(
            format!("vault root {} is not a directory", target.display()),
            ExitStatus::Usage,
        ));
    }
    fs::create_dir_all(&target)?;

    let (paths, created) = init_vault(&target)?;
    Ok(CommandResult::VaultInitialized {
        root: paths.root().display().to_string(),
        dot_notemark: paths.dot_notemark().display().to_string(),
        created,
    })
}
