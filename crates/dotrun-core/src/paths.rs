//! Directory management.
//!
//! Keeps the CLI and library agreeing on where build output and the
//! package cache live.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Environment variable overriding the package cache location.
pub const PACKAGES_ENV: &str = "NUGET_PACKAGES";

/// Directory structure next to a source file.
///
/// ```text
/// Program.cs
/// .dotrun/
/// ├── build/   # Compiled artifacts, one directory per app name
/// └── work/    # Ephemeral build workspaces
/// ```
#[derive(Debug, Clone)]
pub struct ProjectDirs {
    /// The `.dotrun` directory itself.
    pub dotrun_dir: PathBuf,

    /// Build output directory.
    pub build_dir: PathBuf,

    /// Parent of ephemeral workspaces.
    pub work_dir: PathBuf,
}

impl ProjectDirs {
    /// Create the directory structure next to a source file.
    ///
    /// # Errors
    /// Returns an error if directory creation fails.
    pub fn from_source_path(source_path: &Path) -> Result<Self> {
        let source_dir = source_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Self::from_dir(source_dir)
    }

    /// Create the directory structure under `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let dotrun_dir = dir.join(".dotrun");
        let build_dir = dotrun_dir.join("build");
        let work_dir = dotrun_dir.join("work");

        fs::create_dir_all(&build_dir)?;
        fs::create_dir_all(&work_dir)?;

        Ok(Self {
            dotrun_dir,
            build_dir,
            work_dir,
        })
    }

    /// Output directory for one app.
    pub fn output_dir(&self, app_name: &str) -> PathBuf {
        self.build_dir.join(app_name)
    }
}

/// The shared package cache: `$NUGET_PACKAGES`, else `~/.nuget/packages`.
pub fn package_cache_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(PACKAGES_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".nuget")
        .join("packages")
}
