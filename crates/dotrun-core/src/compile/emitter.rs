//! The code generation capability behind the embedded strategy.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::resolve::ReferenceSet;
use crate::toolchain::{BuildMode, ToolchainManager};

use super::diagnostics::{Diagnostic, DiagnosticMapper};

/// Inputs for one emit.
#[derive(Debug, Clone, Copy)]
pub struct EmitRequest<'a> {
    /// Validated source file on disk.
    pub source_path: &'a Path,
    /// Artifact to produce.
    pub output_path: &'a Path,
    pub references: &'a ReferenceSet,
    pub mode: BuildMode,
    pub warnings_as_errors: &'a [String],
}

/// What the emitter reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOutput {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiles a validated source file into an assembly.
pub trait Emitter: Send + Sync {
    fn emit(&self, request: &EmitRequest<'_>) -> Result<EmitOutput>;
}

/// Drives the SDK's Roslyn compiler (`csc.dll`) through `dotnet exec`.
pub struct RoslynEmitter {
    toolchain: ToolchainManager,
    /// Overrides the SDK lookup.
    compiler_path: Option<PathBuf>,
    mapper: DiagnosticMapper,
}

impl RoslynEmitter {
    pub fn new(toolchain: ToolchainManager) -> Self {
        Self {
            toolchain,
            compiler_path: None,
            mapper: DiagnosticMapper::default(),
        }
    }

    /// Use a specific `csc.dll`.
    pub fn with_compiler_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.compiler_path = Some(path.into());
        self
    }

    /// Compiler arguments, one per line of the response file.
    fn arguments(request: &EmitRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "-nologo".to_string(),
            "-noconfig".to_string(),
            "-nostdlib+".to_string(),
            "-target:exe".to_string(),
            "-platform:anycpu".to_string(),
            "-langversion:latest".to_string(),
            "-utf8output".to_string(),
        ];

        if request.mode.is_release() {
            args.push("-optimize+".to_string());
            args.push("-debug-".to_string());
        } else {
            args.push("-optimize-".to_string());
            args.push("-debug:portable".to_string());
            args.push("-define:DEBUG;TRACE".to_string());
        }

        if !request.warnings_as_errors.is_empty() {
            args.push(format!(
                "-warnaserror+:{}",
                request.warnings_as_errors.join(",")
            ));
        }

        args.push(format!("-out:{}", quote(request.output_path)));
        for reference in request.references.iter() {
            args.push(format!("-r:{}", quote(reference)));
        }
        args.push(quote(request.source_path));
        args
    }
}

fn quote(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

impl Emitter for RoslynEmitter {
    fn emit(&self, request: &EmitRequest<'_>) -> Result<EmitOutput> {
        let csc = match &self.compiler_path {
            Some(path) => path.clone(),
            None => self.toolchain.compiler_path()?,
        };

        // Reference lists easily exceed command-line limits; use a response file.
        let rsp = request.source_path.with_extension("rsp");
        std::fs::write(&rsp, Self::arguments(request).join("\n"))?;

        tracing::debug!(
            "Running {} exec {} with {} reference(s)",
            self.toolchain.dotnet_path().display(),
            csc.display(),
            request.references.len()
        );

        let output = Command::new(self.toolchain.dotnet_path())
            .arg("exec")
            .arg(&csc)
            .arg(format!("@{}", rsp.display()))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::ProcessLaunch {
                program: self.toolchain.dotnet_path().display().to_string(),
                source: e,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut diagnostics = self.mapper.parse_output(&stdout);
        diagnostics.extend(self.mapper.parse_output(&stderr));

        if !output.status.success() && !diagnostics.iter().any(Diagnostic::is_error) {
            // Crashed or misconfigured compiler: keep whatever it printed.
            let text = format!("{}{}", stdout, stderr);
            diagnostics.push(Diagnostic::error(format!(
                "compiler exited with {}: {}",
                output.status,
                text.trim()
            )));
        }

        Ok(EmitOutput {
            success: output.status.success(),
            diagnostics,
        })
    }
}
