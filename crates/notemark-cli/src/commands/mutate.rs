use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};
use crate::util::normalize_marker;

fn locator_arg() -> Arg {
    Arg::new("item")
        .value_name("PATH:LINE")
        .required(true)
        .help("Vault-relative note path and 1-based line, as printed by the list commands")
}

fn focus_arg() -> Arg {
    Arg::new("focus")
        .long("focus")
        .action(ArgAction::SetTrue)
        .help("Also add the focus marker")
}

pub fn complete_command() -> Command {
    Command::new("complete")
        .about("Mark a task done and copy it to the archive")
        .arg(locator_arg())
}

pub fn uncomplete_command() -> Command {
    Command::new("uncomplete")
        .about("Reopen a completed task")
        .arg(locator_arg())
}

pub fn priority_command() -> Command {
    Command::new("priority")
        .about("Replace the priority marker of a task")
        .arg(locator_arg())
        .arg(
            Arg::new("marker")
                .value_name("MARKER")
                .required(true)
                .help("One of the configured priority markers"),
        )
        .arg(focus_arg())
}

pub fn untag_command() -> Command {
    Command::new("untag")
        .about("Remove a marker from an item's line")
        .arg(locator_arg())
        .arg(Arg::new("marker").value_name("MARKER").required(true))
}

pub fn convert_command() -> Command {
    Command::new("convert")
        .about("Turn an idea into a task")
        .arg(locator_arg())
}

pub fn run(name: &str, session: &mut CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    session.refresh()?;

    let locator = matches
        .get_one::<String>("item")
        .ok_or_else(|| CliError::new("missing item locator", ExitStatus::Usage))?;
    let item = session.item_at(locator)?;
    let notebook = &mut session.notebook;

    let report = match name {
        "complete" => notebook.complete(&item)?,
        "uncomplete" => notebook.uncomplete(&item)?,
        "priority" => {
            let marker = required_marker(matches)?;
            notebook.set_priority_marker(&item, &marker, matches.get_flag("focus"))?
        }
        "untag" => {
            let marker = required_marker(matches)?;
            notebook.remove_marker(&item, &marker)?
        }
        "convert" => notebook.convert_idea_to_task(&item)?,
        other => {
            return Err(CliError::new(
                format!("unknown mutation '{other}'"),
                ExitStatus::Usage,
            ));
        }
    };

    Ok(CommandResult::Mutated {
        action: name.to_string(),
        report,
    })
}

fn required_marker(matches: &ArgMatches) -> Result<String, CliError> {
    let raw = matches
        .get_one::<String>("marker")
        .ok_or_else(|| CliError::new("missing marker", ExitStatus::Usage))?;
    normalize_marker(raw)
}
