//! Entry point tying toolchain selection to a compilation backend.

use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::error::Result;
use crate::toolchain::ToolchainManager;

use super::embedded::EmbeddedCompiler;
use super::external::ExternalBuilder;
use super::types::{
    CompilationBackend, CompilationRequest, CompilationResult, CompileStrategy, CompilerConfig,
};

/// Compiles requests with the configured strategy.
pub struct Compiler {
    config: CompilerConfig,
    toolchain: ToolchainManager,
    backend: Box<dyn CompilationBackend>,
}

impl Compiler {
    /// Locate the toolchain and build the backend for `config.strategy`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ToolchainNotFound`] if no `dotnet` host is found,
    /// or a source construction error for an invalid package source.
    pub fn new(config: CompilerConfig) -> Result<Self> {
        let toolchain = ToolchainManager::new(config.dotnet_path.as_deref())?
            .with_probe_timeout(config.probe_timeout);

        let backend: Box<dyn CompilationBackend> = match config.strategy {
            CompileStrategy::Embedded => {
                Box::new(EmbeddedCompiler::new(toolchain.clone(), &config)?)
            }
            CompileStrategy::External => Box::new(ExternalBuilder::new(toolchain.clone(), &config)),
        };

        Ok(Self {
            config,
            toolchain,
            backend,
        })
    }

    /// Use a prebuilt backend.
    pub fn with_backend(
        config: CompilerConfig,
        toolchain: ToolchainManager,
        backend: Box<dyn CompilationBackend>,
    ) -> Self {
        Self {
            config,
            toolchain,
            backend,
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn toolchain(&self) -> &ToolchainManager {
        &self.toolchain
    }

    pub fn strategy(&self) -> CompileStrategy {
        self.backend.strategy()
    }

    /// A request using the configured app name.
    pub fn request(&self, source: impl Into<String>) -> CompilationRequest {
        self.config.request(source)
    }

    /// Compile `request` into `output_dir`.
    ///
    /// Failures of the source itself surface as
    /// [`crate::Error::UnsupportedConstruct`] or [`crate::Error::Compilation`].
    pub fn compile(
        &self,
        request: &CompilationRequest,
        output_dir: &Path,
    ) -> Result<CompilationResult> {
        let start = Instant::now();
        fs::create_dir_all(output_dir)?;

        tracing::info!(
            "Compiling {} ({} strategy, {}, {} package(s))",
            request.app_name,
            self.backend.strategy(),
            request.mode.configuration(),
            request.packages.len()
        );

        let result = self.backend.compile(request, output_dir);

        match &result {
            Ok(compiled) => tracing::info!(
                "Compiled {} in {:?} ({} warning(s))",
                request.app_name,
                start.elapsed(),
                compiled.warnings().count()
            ),
            Err(e) => tracing::info!(
                "Compilation of {} failed after {:?}: {}",
                request.app_name,
                start.elapsed(),
                e
            ),
        }

        result
    }

    /// Like [`Compiler::compile`], but source failures become a failed result.
    pub fn compile_to_result(
        &self,
        request: &CompilationRequest,
        output_dir: &Path,
    ) -> Result<CompilationResult> {
        match self.compile(request, output_dir) {
            Ok(result) => Ok(result),
            Err(e) => CompilationResult::from_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct StaticBackend;

    impl CompilationBackend for StaticBackend {
        fn compile(
            &self,
            request: &CompilationRequest,
            output_dir: &Path,
        ) -> Result<CompilationResult> {
            if request.source.contains("broken") {
                return Err(Error::Compilation {
                    message: "broken".to_string(),
                    diagnostics: Vec::new(),
                });
            }
            Ok(CompilationResult::succeeded(
                output_dir.join(format!("{}.dll", request.app_name)),
                Vec::new(),
            ))
        }

        fn strategy(&self) -> CompileStrategy {
            CompileStrategy::Embedded
        }
    }

    fn compiler() -> Compiler {
        Compiler::with_backend(
            CompilerConfig::default(),
            ToolchainManager::with_dotnet(PathBuf::from("dotnet")),
            Box::new(StaticBackend),
        )
    }

    #[test]
    fn test_compile_creates_output_dir() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("nested/out");
        let compiler = compiler();

        let result = compiler.compile(&compiler.request("class A {}"), &out).unwrap();
        assert!(out.is_dir());
        assert_eq!(result.artifact_path, Some(out.join("App.dll")));
        assert_eq!(compiler.strategy(), CompileStrategy::Embedded);
    }

    #[test]
    fn test_compile_to_result() {
        let temp = TempDir::new().unwrap();
        let compiler = compiler();

        let result = compiler
            .compile_to_result(&compiler.request("broken"), temp.path())
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.errors().count(), 1);
    }

    #[test]
    fn test_missing_host() {
        let temp = TempDir::new().unwrap();
        let config = CompilerConfig {
            dotnet_path: Some(temp.path().join("dotnet")),
            ..CompilerConfig::default()
        };
        assert!(matches!(
            Compiler::new(config),
            Err(Error::ToolchainNotFound(_))
        ));
    }
}
