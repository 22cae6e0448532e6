//! Toolchain management for dotrun compilation.
//!
//! Locates the `dotnet` host, its SDKs, the Roslyn compiler shipped with
//! the newest SDK and the reference packs for each target framework.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::resolve::PackageVersion;

use super::probe::{DEFAULT_PROBE_TIMEOUT, VersionProbe, select_version};
use super::version::ToolchainVersion;

/// Environment variable overriding the `dotnet` executable.
pub const DOTNET_ENV: &str = "DOTRUN_DOTNET";

/// An installed SDK as reported by `dotnet --list-sdks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkInstall {
    /// Full SDK version (e.g. "8.0.100")
    pub version: PackageVersion,

    /// Directory containing the SDK version folders (e.g. "/usr/share/dotnet/sdk")
    pub base_dir: PathBuf,
}

impl SdkInstall {
    /// Directory of this specific SDK.
    pub fn sdk_dir(&self) -> PathBuf {
        self.base_dir.join(self.version.to_normalized_string())
    }

    /// The dotnet root (parent of `sdk/`).
    pub fn dotnet_root(&self) -> PathBuf {
        self.base_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone())
    }
}

/// Manages the .NET toolchain for dotrun compilation.
#[derive(Debug, Clone)]
pub struct ToolchainManager {
    /// Path to the dotnet host
    dotnet_path: PathBuf,

    /// Bound on `--list-runtimes`
    probe_timeout: Duration,
}

impl ToolchainManager {
    /// Create a toolchain manager, locating the `dotnet` host.
    ///
    /// Lookup order: the explicit path, `DOTRUN_DOTNET`, then `PATH`.
    pub fn new(explicit: Option<&Path>) -> Result<Self> {
        let dotnet_path = Self::find_dotnet(explicit)?;
        tracing::debug!("Using dotnet host at {}", dotnet_path.display());
        Ok(Self {
            dotnet_path,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        })
    }

    /// Use a specific host without any lookup.
    pub fn with_dotnet(dotnet_path: impl Into<PathBuf>) -> Self {
        Self {
            dotnet_path: dotnet_path.into(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Get the dotnet host path.
    pub fn dotnet_path(&self) -> &Path {
        &self.dotnet_path
    }

    /// Installed toolchain versions, ascending.
    pub fn installed_versions(&self) -> Vec<ToolchainVersion> {
        VersionProbe::new(&self.dotnet_path)
            .with_timeout(self.probe_timeout)
            .discover()
    }

    /// Resolve `Auto` to the lowest installed version.
    pub fn resolve_version(&self, requested: ToolchainVersion) -> Result<ToolchainVersion> {
        if !requested.is_auto() {
            return Ok(requested);
        }

        let installed = self.installed_versions();
        let selected = select_version(requested, &installed).ok_or_else(|| {
            Error::ToolchainNotFound(format!(
                "no .NET runtime 5 or newer found via {}",
                self.dotnet_path.display()
            ))
        })?;
        tracing::info!("Selected toolchain {} (installed: {:?})", selected, installed);
        Ok(selected)
    }

    /// List installed SDKs, ascending by version.
    pub fn list_sdks(&self) -> Result<Vec<SdkInstall>> {
        let output = Command::new(&self.dotnet_path)
            .arg("--list-sdks")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::ProcessLaunch {
                program: self.dotnet_path.display().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(Error::ToolchainNotFound(format!(
                "dotnet --list-sdks failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_sdk_list(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Newest installed SDK.
    pub fn latest_sdk(&self) -> Result<SdkInstall> {
        self.list_sdks()?
            .pop()
            .ok_or_else(|| Error::ToolchainNotFound("no .NET SDK installed".to_string()))
    }

    /// Path to the Roslyn compiler (`csc.dll`) of the newest SDK.
    pub fn compiler_path(&self) -> Result<PathBuf> {
        let sdk = self.latest_sdk()?;
        let csc = sdk.sdk_dir().join("Roslyn").join("bincore").join("csc.dll");
        if !csc.exists() {
            return Err(Error::ToolchainNotFound(format!(
                "Roslyn compiler not found at {}",
                csc.display()
            )));
        }
        Ok(csc)
    }

    /// Reference assembly directory for a concrete version, e.g.
    /// `<root>/packs/Microsoft.NETCore.App.Ref/8.0.1/ref/net8.0`.
    pub fn reference_pack_dir(&self, version: ToolchainVersion) -> Result<PathBuf> {
        let (Some(major), Some(tfm)) = (version.major(), version.target_framework()) else {
            return Err(Error::ToolchainNotFound(
                "reference pack requested for unresolved version".to_string(),
            ));
        };

        let packs = self
            .latest_sdk()?
            .dotnet_root()
            .join("packs")
            .join("Microsoft.NETCore.App.Ref");

        let pack_version = highest_version_dir(&packs, |v| v.major == u64::from(major))
            .ok_or_else(|| {
                Error::ToolchainNotFound(format!(
                    "no reference pack for {} under {}",
                    version,
                    packs.display()
                ))
            })?;

        Ok(packs.join(pack_version).join("ref").join(tfm))
    }

    /// Find dotnet: explicit path, environment override, then PATH.
    fn find_dotnet(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(Error::ToolchainNotFound(format!(
                "dotnet not found at {}",
                path.display()
            )));
        }

        if let Ok(path) = std::env::var(DOTNET_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
            tracing::warn!("{} points at missing file {}", DOTNET_ENV, path.display());
        }

        which::which("dotnet")
            .map_err(|_| Error::ToolchainNotFound("dotnet not found in PATH".to_string()))
    }
}

/// Parse `dotnet --list-sdks` output (`8.0.100 [/usr/share/dotnet/sdk]`).
pub fn parse_sdk_list(output: &str) -> Vec<SdkInstall> {
    let mut sdks: Vec<SdkInstall> = output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (version, rest) = line.split_once(' ')?;
            let version = version.parse().ok()?;
            let base_dir = rest.trim().strip_prefix('[')?.strip_suffix(']')?;
            Some(SdkInstall {
                version,
                base_dir: PathBuf::from(base_dir),
            })
        })
        .collect();
    sdks.sort_by(|a, b| a.version.cmp(&b.version));
    sdks
}

/// Name of the highest version-named subdirectory matching `filter`.
fn highest_version_dir(dir: &Path, filter: impl Fn(&PackageVersion) -> bool) -> Option<String> {
    fs::read_dir(dir)
        .ok()?
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let version: PackageVersion = name.parse().ok()?;
            filter(&version).then_some((version, name))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, name)| name)
}
