//! Kill command implementation for dotrun CLI.

use std::path::Path;

use dotrun_core::execute::{KillStatus, kill_by_name};

use crate::colors;

pub fn execute(name: &Path) -> anyhow::Result<()> {
    let outcomes = kill_by_name(name);
    if outcomes.is_empty() {
        println!("No matching processes.");
        return Ok(());
    }

    for outcome in &outcomes {
        let (color, text) = match &outcome.status {
            KillStatus::Killed => (colors::GREEN, "killed".to_string()),
            KillStatus::AlreadyExited => (colors::DIM, "already exited".to_string()),
            KillStatus::PermissionDenied => (colors::RED, "permission denied".to_string()),
            KillStatus::TimedOut => (colors::YELLOW, "still running".to_string()),
            KillStatus::Failed(e) => (colors::RED, format!("failed: {}", e)),
        };
        println!("  pid {:>7}  {}{}{}", outcome.pid, color, text, colors::RESET);
    }
    Ok(())
}
