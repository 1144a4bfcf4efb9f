use std::time::{Duration, Instant};

use clap::{Arg, ArgMatches, Command, value_parser};
use notemark::{ScheduledAction, VaultWatcher};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;

const IDLE_WAIT: Duration = Duration::from_millis(500);

pub fn command() -> Command {
    Command::new("watch")
        .about("Keep the index current while notes change, printing each rescan")
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64))
                .help("Stop after SECONDS. Runs until interrupted when omitted."),
        )
}

pub fn run(session: &mut CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    session.refresh()?;
    let watcher = VaultWatcher::start(session.vault_paths.root())?;
    let stop_at = matches
        .get_one::<u64>("timeout-secs")
        .map(|secs| Instant::now() + Duration::from_secs(*secs));
    let quiet = session.verbosity.json;

    tracing::info!(root = %session.vault_paths.root().display(), "watching vault");
    let mut events = 0usize;
    loop {
        let now = Instant::now();
        if stop_at.is_some_and(|stop| now >= stop) {
            break;
        }

        let mut wait = IDLE_WAIT;
        if let Some(deadline) = session.notebook.next_deadline() {
            wait = wait.min(deadline.saturating_duration_since(now));
        }
        if let Some(stop) = stop_at {
            wait = wait.min(stop.saturating_duration_since(now));
        }

        if let Some(event) = watcher.next_event(wait)? {
            events += 1;
            let actions = session.notebook.handle_event(event, Instant::now());
            report(&actions, quiet);
        }
        let actions = session.notebook.poll(Instant::now());
        report(&actions, quiet);
    }

    Ok(CommandResult::WatchStopped { events })
}

fn report(actions: &[ScheduledAction], quiet: bool) {
    if quiet {
        return;
    }
    for action in actions {
        match action {
            ScheduledAction::Scan(path) => println!("rescanned {path}"),
            ScheduledAction::Remove(path) => println!("dropped {path}"),
        }
    }
}
