use clap::{Arg, ArgMatches, Command, value_parser};
use notemark::{AnnotationItem, Category};
use serde::Serialize;

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;
use crate::util::normalize_marker;

/// Item as shown to users: 1-based locators, no scan bookkeeping.
#[derive(Clone, Debug, Serialize)]
pub struct ItemSummary {
    pub locator: String,
    pub category: Category,
    pub text: String,
    pub markers: Vec<String>,
    pub priority_rank: u8,
    pub section: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<String>,
}

impl From<&AnnotationItem> for ItemSummary {
    fn from(item: &AnnotationItem) -> Self {
        Self {
            locator: item.locator(),
            category: item.category,
            text: item.raw_text.clone(),
            markers: item.markers.clone(),
            priority_rank: item.priority_rank,
            section: item.is_section,
            parent: item.parent_line.map(|line| line + 1),
            completed_on: item.completed_on.map(|date| date.to_string()),
        }
    }
}

pub fn tasks_command() -> Command {
    Command::new("tasks")
        .about("List open tasks, oldest first")
        .arg(
            Arg::new("group")
                .long("group")
                .value_name("MARKER")
                .help("Only tasks carrying MARKER or living in a note whose name infers it"),
        )
}

pub fn completed_command() -> Command {
    Command::new("completed")
        .about("List completed tasks, newest first (archive excluded)")
        .arg(
            Arg::new("limit")
                .long("limit")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Show at most N items. Defaults to completed_limit from the config."),
        )
}

pub fn ideas_command() -> Command {
    Command::new("ideas").about("List ideas, oldest first")
}

pub fn principles_command() -> Command {
    Command::new("principles").about("List principles, newest first")
}

pub fn groups_command() -> Command {
    Command::new("groups").about("Summarize open tasks by marker")
}

pub fn run(name: &str, session: &mut CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    session.refresh()?;
    let notebook = &session.notebook;

    let items = match name {
        "tasks" => match matches.get_one::<String>("group") {
            Some(group) => notebook.tasks_in_group(&normalize_marker(group)?),
            None => notebook.tasks(),
        },
        "completed" => notebook.completed_tasks(matches.get_one::<usize>("limit").copied()),
        "ideas" => notebook.ideas(),
        "principles" => notebook.principles(),
        _ => {
            return Ok(CommandResult::GroupList {
                groups: notebook.groups(),
            });
        }
    };

    Ok(CommandResult::ItemList {
        category: name.to_string(),
        items: items.iter().map(ItemSummary::from).collect(),
    })
}
