use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};
use crate::util::normalize_marker;

pub fn complete_group_command() -> Command {
    Command::new("complete-group")
        .about("Complete every open task in a group")
        .arg(Arg::new("marker").value_name("MARKER").required(true))
}

pub fn group_priority_command() -> Command {
    Command::new("group-priority")
        .about("Set the same priority on every open task in a group")
        .arg(Arg::new("marker").value_name("MARKER").required(true))
        .arg(Arg::new("priority").value_name("PRIORITY").required(true))
        .arg(
            Arg::new("focus")
                .long("focus")
                .action(ArgAction::SetTrue)
                .help("Also add the focus marker"),
        )
}

/// Batches never stop at the first failure; the outcome lists each one.
pub fn run(name: &str, session: &mut CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    session.refresh()?;
    let marker = normalize_marker(
        matches
            .get_one::<String>("marker")
            .ok_or_else(|| CliError::new("missing group marker", ExitStatus::Usage))?,
    )?;

    let outcome = match name {
        "complete-group" => session.notebook.complete_group(&marker),
        _ => {
            let priority = normalize_marker(
                matches
                    .get_one::<String>("priority")
                    .ok_or_else(|| CliError::new("missing priority marker", ExitStatus::Usage))?,
            )?;
            if !session.notebook.config().markers.is_priority(&priority) {
                return Err(CliError::new(
                    format!("{priority} is not a configured priority marker"),
                    ExitStatus::Config,
                ));
            }
            session
                .notebook
                .set_group_priority(&marker, &priority, matches.get_flag("focus"))
        }
    };

    Ok(CommandResult::Batch {
        action: name.to_string(),
        marker,
        outcome,
    })
}
