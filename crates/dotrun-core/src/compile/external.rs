//! External build strategy: a generated project compiled by `dotnet build`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::toolchain::ToolchainManager;

use super::diagnostics::LOGICAL_SOURCE_NAME;
use super::manifest::{ProjectConfig, generate_csproj};
use super::types::{
    CompilationBackend, CompilationRequest, CompilationResult, CompileStrategy, CompilerConfig,
};
use super::workspace::EphemeralWorkspace;

/// Build output directory inside the workspace.
const BUILD_OUTPUT_DIR: &str = "out";

/// Builds snippets as throwaway SDK projects.
///
/// Supports top-level statements and implicit usings, at the cost of an
/// MSBuild invocation per request. Diagnostics are not parsed: a failed
/// build carries the toolchain's output verbatim.
pub struct ExternalBuilder {
    toolchain: ToolchainManager,
    warnings_as_errors: Vec<String>,
    work_dir: Option<PathBuf>,
}

impl ExternalBuilder {
    pub fn new(toolchain: ToolchainManager, config: &CompilerConfig) -> Self {
        Self {
            toolchain,
            warnings_as_errors: config.warnings_as_errors.clone(),
            work_dir: config.work_dir.clone(),
        }
    }

    fn run_build(&self, workspace: &Path, request: &CompilationRequest) -> Result<()> {
        let dotnet = self.toolchain.dotnet_path();
        let configuration = request.mode.configuration();

        tracing::debug!(
            "Running {} build -c {} in {}",
            dotnet.display(),
            configuration,
            workspace.display()
        );

        let output = Command::new(dotnet)
            .current_dir(workspace)
            .args(["build", "-c", configuration, "-o", BUILD_OUTPUT_DIR, "--nologo"])
            .env("DOTNET_CLI_TELEMETRY_OPTOUT", "1")
            .env("DOTNET_NOLOGO", "1")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::ProcessLaunch {
                program: dotnet.display().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Compilation {
                message: format!(
                    "dotnet build exited with {}\n{}{}",
                    output.status, stdout, stderr
                ),
                diagnostics: Vec::new(),
            });
        }

        Ok(())
    }
}

/// Copy every file under `from` into `to`, overwriting existing files.
fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    fs::create_dir_all(to)?;
    let mut copied = 0;
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// The runnable artifact in `dir`: apphost first, then the managed assembly.
fn locate_artifact(dir: &Path, app_name: &str) -> Option<PathBuf> {
    let apphost = if cfg!(windows) {
        format!("{}.exe", app_name)
    } else {
        app_name.to_string()
    };

    [apphost, format!("{}.dll", app_name)]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

impl CompilationBackend for ExternalBuilder {
    fn compile(
        &self,
        request: &CompilationRequest,
        output_dir: &Path,
    ) -> Result<CompilationResult> {
        let version = self.toolchain.resolve_version(request.version)?;
        let Some(tfm) = version.target_framework() else {
            return Err(Error::ToolchainNotFound(format!(
                "no target framework for {}",
                version
            )));
        };

        let workspace = EphemeralWorkspace::create(self.work_dir.as_deref())?;

        let project = ProjectConfig {
            warnings_as_errors: &self.warnings_as_errors,
            ..ProjectConfig::console(&request.app_name, &tfm)
        };
        workspace.write(
            format!("{}.csproj", request.app_name),
            generate_csproj(&project, &request.packages),
        )?;
        workspace.write(LOGICAL_SOURCE_NAME, &request.source)?;

        tracing::debug!("{}: compiling for {}", request.app_name, version);
        self.run_build(workspace.path(), request)?;

        let copied = copy_tree(&workspace.path().join(BUILD_OUTPUT_DIR), output_dir)?;
        tracing::debug!(
            "{}: copied {} file(s) to {}",
            request.app_name,
            copied,
            output_dir.display()
        );

        let artifact = locate_artifact(output_dir, &request.app_name).ok_or_else(|| {
            Error::Compilation {
                message: format!(
                    "build succeeded but no artifact named {} in {}",
                    request.app_name,
                    output_dir.display()
                ),
                diagnostics: Vec::new(),
            }
        })?;

        Ok(CompilationResult::succeeded(artifact, Vec::new()))
    }

    fn strategy(&self) -> CompileStrategy {
        CompileStrategy::External
    }
}
