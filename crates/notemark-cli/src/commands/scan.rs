use clap::{ArgMatches, Command};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;

pub fn command() -> Command {
    Command::new("scan").about("Scan every note, repairing malformed markers in place")
}

pub fn run(session: &mut CliSession, _matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let summary = session.refresh()?;
    Ok(CommandResult::Scanned { summary })
}
