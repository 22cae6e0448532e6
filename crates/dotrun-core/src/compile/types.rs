//! Common types for the compilation pipeline.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paths::ProjectDirs;
use crate::resolve::{PackageRequest, ResolverConfig};
use crate::toolchain::{BuildMode, DEFAULT_PROBE_TIMEOUT, ToolchainVersion};

use super::diagnostics::{Diagnostic, LOGICAL_SOURCE_NAME, Severity, SourceLocation};

/// Default assembly name of the produced artifact.
pub const DEFAULT_APP_NAME: &str = "App";

/// Which backend compiles a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileStrategy {
    /// Validate in-process, compile with the SDK's compiler directly.
    /// Structured diagnostics; no top-level statements.
    Embedded,
    /// Generate a project and run `dotnet build`.
    #[default]
    External,
}

impl fmt::Display for CompileStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded => write!(f, "embedded"),
            Self::External => write!(f, "external"),
        }
    }
}

impl FromStr for CompileStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded" => Ok(Self::Embedded),
            "external" => Ok(Self::External),
            other => Err(Error::Compilation {
                message: format!(
                    "unknown compile strategy '{}' (expected embedded or external)",
                    other
                ),
                diagnostics: Vec::new(),
            }),
        }
    }
}

/// Configuration for the compiler.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub strategy: CompileStrategy,

    /// Assembly name used when a request does not set one
    pub app_name: String,

    /// Explicit dotnet host; otherwise `DOTRUN_DOTNET` then `PATH`
    pub dotnet_path: Option<PathBuf>,

    /// Bound on runtime discovery
    pub probe_timeout: Duration,

    /// Warning codes elevated to errors (e.g. "CS0168")
    pub warnings_as_errors: Vec<String>,

    /// Parent of ephemeral build workspaces (system temp dir if `None`)
    pub work_dir: Option<PathBuf>,

    /// Package resolution settings
    pub resolver: ResolverConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            strategy: CompileStrategy::default(),
            app_name: DEFAULT_APP_NAME.to_string(),
            dotnet_path: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            warnings_as_errors: Vec::new(),
            work_dir: None,
            resolver: ResolverConfig::default(),
        }
    }
}

impl CompilerConfig {
    /// Create config for the embedded strategy.
    pub fn embedded() -> Self {
        Self {
            strategy: CompileStrategy::Embedded,
            ..Default::default()
        }
    }

    /// Create config for the external build strategy.
    pub fn external() -> Self {
        Self {
            strategy: CompileStrategy::External,
            ..Default::default()
        }
    }

    /// Create a config whose workspaces live under the project's `.dotrun/work`.
    pub fn for_project(dirs: &ProjectDirs, strategy: CompileStrategy) -> Self {
        Self {
            strategy,
            work_dir: Some(dirs.work_dir.clone()),
            ..Default::default()
        }
    }

    /// A request for `source` using this config's app name.
    pub fn request(&self, source: impl Into<String>) -> CompilationRequest {
        CompilationRequest::new(source).with_app_name(self.app_name.clone())
    }
}

/// What to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationRequest {
    pub source: String,
    pub version: ToolchainVersion,
    pub mode: BuildMode,
    pub packages: Vec<PackageRequest>,
    pub app_name: String,
}

impl CompilationRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            version: ToolchainVersion::Auto,
            mode: BuildMode::Release,
            packages: Vec::new(),
            app_name: DEFAULT_APP_NAME.to_string(),
        }
    }

    pub fn with_version(mut self, version: ToolchainVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_packages(mut self, packages: Vec<PackageRequest>) -> Self {
        self.packages = packages;
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }
}

/// Outcome of a compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationResult {
    pub success: bool,

    /// Produced artifact; set on success
    pub artifact_path: Option<PathBuf>,

    /// Diagnostics in compiler order; warnings are kept on success
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilationResult {
    pub fn succeeded(artifact_path: PathBuf, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            success: true,
            artifact_path: Some(artifact_path),
            diagnostics,
        }
    }

    pub fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            success: false,
            artifact_path: None,
            diagnostics,
        }
    }

    /// Turn a compilation-shaped error into a failed result.
    ///
    /// Errors that are not about the source (toolchain, packages, IO) are
    /// handed back unchanged.
    pub fn from_error(error: Error) -> Result<Self> {
        match error {
            Error::Compilation {
                message,
                diagnostics,
            } => {
                let diagnostics = if diagnostics.is_empty() {
                    vec![Diagnostic::error(message)]
                } else {
                    diagnostics
                };
                Ok(Self::failed(diagnostics))
            }
            Error::UnsupportedConstruct {
                line,
                column,
                message,
            } => Ok(Self::failed(vec![Diagnostic {
                severity: Severity::Error,
                code: None,
                message,
                location: Some(SourceLocation {
                    file: PathBuf::from(LOGICAL_SOURCE_NAME),
                    line,
                    column,
                }),
            }])),
            other => Err(other),
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}

/// A compilation strategy.
pub trait CompilationBackend: Send + Sync {
    /// Compile `request` into `output_dir`.
    fn compile(&self, request: &CompilationRequest, output_dir: &Path)
    -> Result<CompilationResult>;

    fn strategy(&self) -> CompileStrategy;
}
