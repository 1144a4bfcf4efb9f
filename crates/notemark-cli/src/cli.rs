use std::ffi::OsString;
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::commands;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};
use crate::formatter::{OutputFormat, emit_result};
use crate::util::Verbosity;

const NAME: &str = "notemark";

pub fn run() -> ExitCode {
    init_tracing();
    match run_cli(std::env::args()) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Parses arguments, resolves the vault and dispatches to a subcommand.
/// Returns a `sysexits`-compatible `ExitCode`.
pub fn run_cli<I, S>(args: I) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let command = build_cli();
    let matches = command.try_get_matches_from(args)?;

    let verbosity = Verbosity {
        json: matches.get_flag("json"),
        verbose: matches.get_flag("verbose"),
    };
    let output = if verbosity.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let vault_override = matches.get_one::<String>("vault").cloned();
    if let Some(("init", sub)) = matches.subcommand() {
        let result = commands::init::run(vault_override, sub)?;
        return emit_result(result, output);
    }

    let mut session = CliSession::bootstrap(vault_override, verbosity)?;
    if session.verbosity.verbose {
        tracing::info!(
            vault = %session.vault_paths.root().display(),
            config = %session.vault_paths.config_file().display(),
            archive = %session.notebook.config().archive_path,
            "resolved vault context"
        );
    }

    let result = dispatch(&mut session, &matches)?;
    emit_result(result, output)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    Command::new(NAME)
        .about("Track #task, #idea and #principle markers across a Markdown vault")
        .arg(
            Arg::new("vault")
                .long("vault")
                .value_name("PATH")
                .global(true)
                .help("Vault root. Defaults to the nearest ancestor with a .notemark folder."),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Emit JSON instead of human-readable text."),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Log the resolved vault paths."),
        )
        .subcommand_required(true)
        .subcommand(commands::init::command())
        .subcommand(commands::scan::command())
        .subcommand(commands::list::tasks_command())
        .subcommand(commands::list::completed_command())
        .subcommand(commands::list::ideas_command())
        .subcommand(commands::list::principles_command())
        .subcommand(commands::list::groups_command())
        .subcommand(commands::mutate::complete_command())
        .subcommand(commands::mutate::uncomplete_command())
        .subcommand(commands::mutate::priority_command())
        .subcommand(commands::mutate::untag_command())
        .subcommand(commands::mutate::convert_command())
        .subcommand(commands::group::complete_group_command())
        .subcommand(commands::group::group_priority_command())
        .subcommand(commands::watch::command())
}

fn dispatch(
    session: &mut CliSession,
    matches: &ArgMatches,
) -> Result<commands::CommandResult, CliError> {
    match matches.subcommand() {
        Some(("scan", sub)) => commands::scan::run(session, sub),
        Some((name @ ("tasks" | "completed" | "ideas" | "principles" | "groups"), sub)) => {
            commands::list::run(name, session, sub)
        }
        Some((name @ ("complete" | "uncomplete" | "priority" | "untag" | "convert"), sub)) => {
            commands::mutate::run(name, session, sub)
        }
        Some((name @ ("complete-group" | "group-priority"), sub)) => {
            commands::group::run(name, session, sub)
        }
        Some(("watch", sub)) => commands::watch::run(session, sub),
        _ => Err(CliError::new("missing command", ExitStatus::Usage)),
    }
}
