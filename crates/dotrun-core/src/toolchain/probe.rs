//! Installed runtime discovery.
//!
//! Runs `dotnet --list-runtimes` and reduces its output to the set of
//! supported major versions.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use crate::resolve::PackageVersion;

use super::version::ToolchainVersion;

/// Runtime components whose versions count as an installed toolchain.
pub const RUNTIME_PREFIXES: [&str; 3] = [
    "Microsoft.NETCore.App",
    "Microsoft.AspNetCore.App",
    "Microsoft.WindowsDesktop.App",
];

/// Default bound on the diagnostic command.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Discovers installed toolchain versions.
#[derive(Debug, Clone)]
pub struct VersionProbe {
    dotnet: PathBuf,
    timeout: Duration,
}

impl VersionProbe {
    pub fn new(dotnet: impl Into<PathBuf>) -> Self {
        Self {
            dotnet: dotnet.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// List installed versions, ascending.
    ///
    /// Never fails: a missing executable, a timeout or a non-zero exit all
    /// produce an empty list.
    pub fn discover(&self) -> Vec<ToolchainVersion> {
        match self.run_list_runtimes() {
            Some(output) => parse_runtime_list(&output),
            None => Vec::new(),
        }
    }

    fn run_list_runtimes(&self) -> Option<String> {
        let mut child = match Command::new(&self.dotnet)
            .arg("--list-runtimes")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!("Failed to run {} --list-runtimes: {}", self.dotnet.display(), e);
                return None;
            }
        };

        let mut stdout = child.stdout.take()?;
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut output = String::new();
            let result = stdout.read_to_string(&mut output).map(|_| output);
            let _ = tx.send(result);
        });

        let output = match rx.recv_timeout(self.timeout) {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::debug!("Failed to read runtime list: {}", e);
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    "{} --list-runtimes did not finish within {:?}",
                    self.dotnet.display(),
                    self.timeout
                );
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        };

        match child.wait() {
            Ok(status) if status.success() => Some(output),
            Ok(status) => {
                tracing::debug!("dotnet --list-runtimes exited with {}", status);
                None
            }
            Err(e) => {
                tracing::debug!("Failed to wait for dotnet --list-runtimes: {}", e);
                None
            }
        }
    }
}

/// Parse `dotnet --list-runtimes` output.
///
/// Lines look like `Microsoft.NETCore.App 8.0.1 [/usr/share/dotnet/shared/...]`.
/// Lines with an unknown prefix, an unparseable version or an unsupported
/// major version are skipped.
pub fn parse_runtime_list(output: &str) -> Vec<ToolchainVersion> {
    let mut versions = BTreeSet::new();

    for line in output.lines() {
        if let Some(version) = parse_runtime_line(line) {
            versions.insert(version);
        }
    }

    versions.into_iter().collect()
}

fn parse_runtime_line(line: &str) -> Option<ToolchainVersion> {
    let line = line.trim();
    if !RUNTIME_PREFIXES.iter().any(|prefix| line.starts_with(prefix)) {
        return None;
    }

    let token = line.split_whitespace().nth(1)?;
    let version: PackageVersion = token.parse().ok()?;
    ToolchainVersion::from_major(version.major)
}

/// Resolve a requested version against the installed set.
///
/// Concrete requests are returned unchanged; an uninstalled version fails
/// later, at build time. `Auto` picks the lowest installed version, or `None`
/// when nothing supported is installed.
pub fn select_version(
    requested: ToolchainVersion,
    installed: &[ToolchainVersion],
) -> Option<ToolchainVersion> {
    if !requested.is_auto() {
        return Some(requested);
    }

    ToolchainVersion::CONCRETE
        .into_iter()
        .find(|candidate| installed.contains(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Microsoft.AspNetCore.App 6.0.25 [/usr/share/dotnet/shared/Microsoft.AspNetCore.App]
Microsoft.AspNetCore.App 8.0.1 [/usr/share/dotnet/shared/Microsoft.AspNetCore.App]
Microsoft.NETCore.App 3.1.32 [/usr/share/dotnet/shared/Microsoft.NETCore.App]
Microsoft.NETCore.App 6.0.25 [/usr/share/dotnet/shared/Microsoft.NETCore.App]
Microsoft.NETCore.App 8.0.1 [/usr/share/dotnet/shared/Microsoft.NETCore.App]
Microsoft.NETCore.App 9.0.0-preview.7.24405.7 [/usr/share/dotnet/shared/Microsoft.NETCore.App]
Some.Other.Runtime 7.0.0 [/opt/other]
Microsoft.NETCore.App garbage [/broken]
Microsoft.NETCore.App
";

    #[test]
    fn test_parse_runtime_list() {
        let versions = parse_runtime_list(SAMPLE);
        assert_eq!(
            versions,
            vec![ToolchainVersion::V6, ToolchainVersion::V8, ToolchainVersion::V9]
        );
    }

    #[test]
    fn test_parse_windows_line_endings() {
        let output = "Microsoft.WindowsDesktop.App 7.0.14 [C:\\Program Files\\dotnet]\r\n";
        assert_eq!(parse_runtime_list(output), vec![ToolchainVersion::V7]);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_runtime_list("").is_empty());
    }

    #[test]
    fn test_select_concrete_unchanged() {
        assert_eq!(
            select_version(ToolchainVersion::V9, &[]),
            Some(ToolchainVersion::V9)
        );
    }

    #[test]
    fn test_select_auto_lowest() {
        let installed = [ToolchainVersion::V8, ToolchainVersion::V6];
        assert_eq!(
            select_version(ToolchainVersion::Auto, &installed),
            Some(ToolchainVersion::V6)
        );
        assert_eq!(select_version(ToolchainVersion::Auto, &[]), None);
    }

    #[test]
    fn test_discover_missing_executable() {
        let probe = VersionProbe::new("/nonexistent/dotnet-binary");
        assert!(probe.discover().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let script = temp.path().join("dotnet");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let start = std::time::Instant::now();
        let probe = VersionProbe::new(&script).with_timeout(Duration::from_millis(200));
        assert!(probe.discover().is_empty());
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
