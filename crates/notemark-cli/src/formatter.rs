use std::process::ExitCode;

use serde_json::json;

use crate::commands::CommandResult;
use crate::commands::list::ItemSummary;
use crate::error::CliError;

pub enum OutputFormat {
    Text,
    Json,
}

/// Renders a `CommandResult` as text or a single JSON object and maps it to an exit code.
pub fn emit_result(result: CommandResult, format: OutputFormat) -> Result<ExitCode, CliError> {
    match format {
        OutputFormat::Text => print_text(&result),
        OutputFormat::Json => print_json(&result)?,
    };
    Ok(ExitCode::from(result.exit_status().code()))
}

fn print_text(result: &CommandResult) {
    match result {
        CommandResult::VaultInitialized {
            root,
            dot_notemark,
            created,
        } => {
            if *created {
                println!("Initialized vault at {root} (config in {dot_notemark})");
            } else {
                println!("Vault already initialized at {root}");
            }
        }
        CommandResult::Scanned { summary } => {
            println!(
                "Scanned {} notes: {} items, {} lines repaired",
                summary.documents, summary.items, summary.repaired_lines
            );
            for failure in &summary.failures {
                println!("  [ERR] {}: {}", failure.path, failure.message);
            }
        }
        CommandResult::ItemList { category, items } => {
            if items.is_empty() {
                println!("No {category}.");
                return;
            }
            for item in items {
                print_item(item);
            }
        }
        CommandResult::GroupList { groups } => {
            if groups.is_empty() {
                println!("No groups.");
            }
            for group in groups {
                println!("{} ({} open)", group.marker, group.count);
            }
        }
        CommandResult::Mutated { action, report } => {
            println!("{action}: {}:{}", report.path, report.line + 1);
            println!("  - {}", report.before);
            println!("  + {}", report.after);
            if !report.children.is_empty() {
                println!("  with {} child line(s)", report.children.len());
            }
            if action == "complete" && !report.archived {
                println!("  warning: archive was not updated");
            }
        }
        CommandResult::Batch {
            action,
            marker,
            outcome,
        } => {
            let total = outcome.succeeded + outcome.failed;
            let verb = if action == "complete-group" {
                "Completed"
            } else {
                "Reprioritized"
            };
            if outcome.failed == 0 {
                println!("{verb} {} of {total} tasks in {marker}", outcome.succeeded);
            } else {
                println!(
                    "{verb} {} of {total} tasks in {marker} ({} failed)",
                    outcome.succeeded, outcome.failed
                );
            }
            for failure in &outcome.failures {
                println!("  [ERR] {}: {}", failure.locator, failure.message);
            }
        }
        CommandResult::WatchStopped { events } => {
            println!("Stopped watching after {events} change(s)");
        }
    }
}

fn print_item(item: &ItemSummary) {
    let mut line = format!("{}  {}", item.locator, item.text.trim());
    if let Some(date) = &item.completed_on {
        line.push_str(&format!("  [{date}]"));
    }
    if let Some(parent) = item.parent {
        line.push_str(&format!("  (under line {parent})"));
    }
    println!("{line}");
}

fn print_json(result: &CommandResult) -> Result<(), CliError> {
    let payload = json!(result);
    println!("{payload}");
    Ok(())
}
