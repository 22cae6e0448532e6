//! Terminating stray artifact processes by name.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// How long to wait for a killed process to disappear.
const EXIT_WAIT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of terminating one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillStatus {
    Killed,
    /// Gone before the signal landed.
    AlreadyExited,
    PermissionDenied,
    /// Signalled but still present after the wait.
    TimedOut,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillOutcome {
    pub pid: u32,
    pub status: KillStatus,
}

/// Kill every process named like the artifact at `path`.
///
/// Matches on the file stem (`/out/App.exe` matches `App`). Failures are
/// reported per process and never stop the sweep; no match is an empty report.
pub fn kill_by_name(path: &Path) -> Vec<KillOutcome> {
    let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };

    let own = std::process::id();
    let pids: Vec<u32> = find_pids(name).into_iter().filter(|&pid| pid != own).collect();
    tracing::debug!("Found {} process(es) named {}", pids.len(), name);

    pids.into_iter()
        .map(|pid| {
            let status = terminate(pid);
            match &status {
                KillStatus::Killed => tracing::info!("Killed {} (pid {})", name, pid),
                KillStatus::AlreadyExited => {
                    tracing::debug!("{} (pid {}) already exited", name, pid)
                }
                other => tracing::warn!("Could not kill {} (pid {}): {:?}", name, pid, other),
            }
            KillOutcome { pid, status }
        })
        .collect()
}

fn wait_for_exit(pid: u32) -> KillStatus {
    let deadline = Instant::now() + EXIT_WAIT;
    while Instant::now() < deadline {
        if !is_alive(pid) {
            return KillStatus::Killed;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    KillStatus::TimedOut
}

#[cfg(unix)]
fn find_pids(name: &str) -> Vec<u32> {
    // Linux matches against the 15-byte `comm` name.
    #[cfg(target_os = "linux")]
    let name = truncate_comm(name);

    let output = match Command::new("pgrep")
        .arg("-x")
        .arg("--")
        .arg(name)
        .stdin(Stdio::null())
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Failed to run pgrep: {}", e);
            return Vec::new();
        }
    };

    // Exit status 1 means no match.
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

#[cfg(target_os = "linux")]
fn truncate_comm(name: &str) -> &str {
    let mut end = name.len().min(15);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

#[cfg(unix)]
fn terminate(pid: u32) -> KillStatus {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return match err.raw_os_error() {
            Some(libc::ESRCH) => KillStatus::AlreadyExited,
            Some(libc::EPERM) => KillStatus::PermissionDenied,
            _ => KillStatus::Failed(err.to_string()),
        };
    }
    wait_for_exit(pid)
}

#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc != 0 {
        return std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
    }
    !is_zombie(pid)
}

/// Killed but unreaped children linger as zombies.
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            // State follows the parenthesised command name.
            let rest = &stat[stat.rfind(')')? + 1..];
            rest.split_whitespace().next().map(|state| state == "Z")
        })
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}

#[cfg(windows)]
fn find_pids(name: &str) -> Vec<u32> {
    let output = match Command::new("tasklist")
        .args(["/FO", "CSV", "/NH", "/FI"])
        .arg(format!("IMAGENAME eq {}.exe", name))
        .stdin(Stdio::null())
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Failed to run tasklist: {}", e);
            return Vec::new();
        }
    };
    parse_tasklist(&String::from_utf8_lossy(&output.stdout), name)
}

/// Parse `tasklist /FO CSV /NH` rows: `"App.exe","1234","Console","1","5,000 K"`.
#[cfg(any(windows, test))]
fn parse_tasklist(output: &str, name: &str) -> Vec<u32> {
    let image = format!("{}.exe", name);
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split("\",\"").map(|f| f.trim_matches('"'));
            let process = fields.next()?;
            let pid = fields.next()?;
            if process.eq_ignore_ascii_case(&image) {
                pid.trim().parse().ok()
            } else {
                None
            }
        })
        .collect()
}

#[cfg(windows)]
fn terminate(pid: u32) -> KillStatus {
    let output = match Command::new("taskkill")
        .args(["/F", "/PID"])
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .output()
    {
        Ok(output) => output,
        Err(e) => return KillStatus::Failed(e.to_string()),
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        return if stderr.contains("access is denied") {
            KillStatus::PermissionDenied
        } else if stderr.contains("not found") {
            KillStatus::AlreadyExited
        } else {
            KillStatus::Failed(stderr.trim().to_string())
        };
    }
    wait_for_exit(pid)
}

#[cfg(windows)]
fn is_alive(pid: u32) -> bool {
    Command::new("tasklist")
        .args(["/FO", "CSV", "/NH", "/FI"])
        .arg(format!("PID eq {}", pid))
        .stdin(Stdio::null())
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&format!("\"{}\"", pid)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_is_empty() {
        let outcomes = kill_by_name(Path::new("/nowhere/dotrun-no-such-process-3f9a"));
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_parse_tasklist() {
        let output = "\"App.exe\",\"1234\",\"Console\",\"1\",\"5,000 K\"\r\n\
                      \"app.EXE\",\"88\",\"Console\",\"1\",\"4,100 K\"\r\n\
                      \"Other.exe\",\"99\",\"Console\",\"1\",\"1,000 K\"\r\n";
        assert_eq!(parse_tasklist(output, "App"), vec![1234, 88]);
        assert!(parse_tasklist("INFO: No tasks are running.", "App").is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_truncate_comm() {
        assert_eq!(truncate_comm("App"), "App");
        assert_eq!(truncate_comm("VeryLongApplicationName"), "VeryLongApplica");
    }
}
