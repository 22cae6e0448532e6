//! Toolchain versions and build modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Target .NET toolchain version.
///
/// `Auto` is resolved against the installed runtimes before a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ToolchainVersion {
    #[default]
    Auto,
    V5,
    V6,
    V7,
    V8,
    V9,
}

impl ToolchainVersion {
    /// Concrete versions in preference order (lowest first).
    pub const CONCRETE: [ToolchainVersion; 5] = [Self::V5, Self::V6, Self::V7, Self::V8, Self::V9];

    /// Major version number, `None` for `Auto`.
    pub fn major(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::V5 => Some(5),
            Self::V6 => Some(6),
            Self::V7 => Some(7),
            Self::V8 => Some(8),
            Self::V9 => Some(9),
        }
    }

    /// Map a runtime major version to a supported toolchain version.
    pub fn from_major(major: u64) -> Option<Self> {
        match major {
            5 => Some(Self::V5),
            6 => Some(Self::V6),
            7 => Some(Self::V7),
            8 => Some(Self::V8),
            9 => Some(Self::V9),
            _ => None,
        }
    }

    /// Target framework moniker, e.g. `net8.0`.
    pub fn target_framework(self) -> Option<String> {
        self.major().map(|m| format!("net{}.0", m))
    }

    pub fn is_auto(self) -> bool {
        self == Self::Auto
    }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.major() {
            Some(major) => write!(f, ".NET {}", major),
            None => f.write_str("auto"),
        }
    }
}

impl FromStr for ToolchainVersion {
    type Err = Error;

    /// Accepts `auto`, `8`, `v8`, `net8.0` and `.NET 8`.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "auto" {
            return Ok(Self::Auto);
        }

        let digits = lower
            .trim_start_matches(".net")
            .trim_start_matches("net")
            .trim_start_matches('v')
            .trim();
        let digits = digits.strip_suffix(".0").unwrap_or(digits);

        digits
            .parse::<u64>()
            .ok()
            .and_then(Self::from_major)
            .ok_or_else(|| {
                Error::ToolchainNotFound(format!(
                    "unsupported toolchain version '{}' (expected auto or 5-9)",
                    s
                ))
            })
    }
}

/// Build configuration passed to the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildMode {
    #[default]
    Release,
    Debug,
}

impl BuildMode {
    /// Configuration name understood by `dotnet build -c`.
    pub fn configuration(self) -> &'static str {
        match self {
            Self::Release => "Release",
            Self::Debug => "Debug",
        }
    }

    pub fn is_release(self) -> bool {
        self == Self::Release
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.configuration())
    }
}
