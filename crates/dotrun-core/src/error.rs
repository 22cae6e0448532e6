//! Error types for dotrun-core.

use thiserror::Error;

use crate::compile::Diagnostic;

/// Result type for dotrun-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dotrun-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Source shape rejected before any compiler invocation.
    #[error("unsupported construct at line {line}, column {column}: {message}")]
    UnsupportedConstruct {
        line: usize,
        column: usize,
        message: String,
    },

    /// The compiler or external toolchain reported a failure.
    ///
    /// `diagnostics` is populated by the embedded strategy only; the external
    /// strategy embeds the toolchain's captured output in `message`.
    #[error("compilation failed: {message}")]
    Compilation {
        message: String,
        diagnostics: Vec<Diagnostic>,
    },

    /// A requested package or its closure could not be resolved.
    #[error("package resolution failed: {0}")]
    PackageResolution(String),

    /// Package content could not be fetched or extracted.
    #[error("download failed: {0}")]
    Download(String),

    /// No usable toolchain for the requested version.
    #[error("toolchain not found: {0}")]
    ToolchainNotFound(String),

    /// Spawning a child process failed at the OS level.
    #[error("failed to launch process '{program}': {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Package metadata (nuspec, service index) could not be parsed.
    #[error("invalid package metadata: {0}")]
    Manifest(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// A short recovery hint for terminal display, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedConstruct { .. } => Some(
                "wrap top-level statements in a class with a static Main method, \
                 or use the external build strategy",
            ),
            Self::ToolchainNotFound(_) => Some(
                "install a .NET SDK (5 or newer) or point DOTRUN_DOTNET at the dotnet executable",
            ),
            Self::PackageResolution(_) => {
                Some("check the package id and version, and the configured package sources")
            }
            Self::Download(_) => Some("check network access to the package source"),
            _ => None,
        }
    }

    /// Format the error with its hint appended.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }

    /// Diagnostics carried by a compilation failure.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Compilation { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_formatting() {
        let err = Error::ToolchainNotFound("no .NET runtime installed".to_string());
        let formatted = err.with_hint();
        assert!(formatted.starts_with("toolchain not found: no .NET runtime installed"));
        assert!(formatted.contains("hint: install a .NET SDK"));

        let err = Error::Manifest("bad xml".to_string());
        assert_eq!(err.with_hint(), "invalid package metadata: bad xml");
    }

    #[test]
    fn test_diagnostics_accessor() {
        let err = Error::PackageResolution("missing".to_string());
        assert!(err.diagnostics().is_empty());
    }
}
