//! Embedded compilation strategy.
//!
//! The source is validated in-process, references are assembled from the
//! selected runtime's reference pack plus resolved packages, and the
//! [`Emitter`] produces a framework-dependent `<app>.dll`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::resolve::{DependencyResolver, ReferenceSet};
use crate::toolchain::{BuildMode, ToolchainManager, ToolchainVersion};

use super::diagnostics::{Diagnostic, LOGICAL_SOURCE_NAME};
use super::emitter::{EmitRequest, Emitter, RoslynEmitter};
use super::outline::SourceOutline;
use super::types::{
    CompilationBackend, CompilationRequest, CompilationResult, CompileStrategy, CompilerConfig,
};
use super::workspace::EphemeralWorkspace;

/// Assemblies from the reference pack every program compiles against.
pub const BASELINE_REFERENCES: [&str; 8] = [
    "System.Runtime",
    "System.Collections",
    "System.Collections.Concurrent",
    "System.Threading",
    "System.Console",
    "System.Linq",
    "Microsoft.CSharp",
    "netstandard",
];

/// Compiles snippets without a project file.
pub struct EmbeddedCompiler {
    toolchain: ToolchainManager,
    emitter: Box<dyn Emitter>,
    resolver: DependencyResolver,

    /// Replaces the reference pack lookup
    reference_dir: Option<PathBuf>,

    warnings_as_errors: Vec<String>,
    work_dir: Option<PathBuf>,
}

impl EmbeddedCompiler {
    /// Create an embedded compiler driving the SDK's Roslyn compiler.
    pub fn new(toolchain: ToolchainManager, config: &CompilerConfig) -> Result<Self> {
        let resolver = DependencyResolver::new(config.resolver.clone())?;
        Ok(Self {
            emitter: Box::new(RoslynEmitter::new(toolchain.clone())),
            toolchain,
            resolver,
            reference_dir: None,
            warnings_as_errors: config.warnings_as_errors.clone(),
            work_dir: config.work_dir.clone(),
        })
    }

    pub fn with_emitter(mut self, emitter: Box<dyn Emitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_resolver(mut self, resolver: DependencyResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Compile against the assemblies in `dir` instead of the reference pack.
    pub fn with_reference_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reference_dir = Some(dir.into());
        self
    }

    /// Baseline references for `version`, skipping assemblies the pack lacks.
    fn baseline_references(&self, version: ToolchainVersion) -> Result<ReferenceSet> {
        let dir = match &self.reference_dir {
            Some(dir) => dir.clone(),
            None => self.toolchain.reference_pack_dir(version)?,
        };
        if !dir.is_dir() {
            return Err(Error::ToolchainNotFound(format!(
                "reference assemblies for {} not found at {}",
                version,
                dir.display()
            )));
        }

        let mut references = ReferenceSet::new();
        for name in BASELINE_REFERENCES {
            let path = dir.join(format!("{}.dll", name));
            if path.is_file() {
                references.push(path);
            } else {
                tracing::debug!("Reference {} not present in {}", name, dir.display());
            }
        }
        Ok(references)
    }
}

/// Write `<app>.runtimeconfig.json` so `dotnet <app>.dll` picks the runtime.
fn write_runtime_config(artifact: &Path, version: ToolchainVersion) -> Result<PathBuf> {
    let (Some(major), Some(tfm)) = (version.major(), version.target_framework()) else {
        return Err(Error::ToolchainNotFound(
            "runtime config requested for unresolved version".to_string(),
        ));
    };

    let config = serde_json::json!({
        "runtimeOptions": {
            "tfm": tfm,
            "framework": {
                "name": "Microsoft.NETCore.App",
                "version": format!("{}.0.0", major),
            }
        }
    });

    let path = artifact.with_extension("runtimeconfig.json");
    let text = serde_json::to_string_pretty(&config)
        .map_err(|e| Error::Manifest(format!("runtime config: {}", e)))?;
    fs::write(&path, text)?;
    Ok(path)
}

/// Copy package assemblies next to the artifact so the host can load them.
fn copy_package_assemblies(references: &ReferenceSet, output_dir: &Path) -> Result<()> {
    for reference in references.iter() {
        let Some(name) = reference.file_name() else {
            continue;
        };
        fs::copy(reference, output_dir.join(name))?;
    }
    Ok(())
}

impl CompilationBackend for EmbeddedCompiler {
    fn compile(
        &self,
        request: &CompilationRequest,
        output_dir: &Path,
    ) -> Result<CompilationResult> {
        tracing::debug!("{}: validating", request.app_name);
        SourceOutline::parse(&request.source).validate()?;

        let version = self.toolchain.resolve_version(request.version)?;
        let mut references = self.baseline_references(version)?;
        let packages = self.resolver.resolve(&request.packages)?;
        references.extend(packages.iter().map(Path::to_path_buf));

        tracing::debug!(
            "{}: compiling for {} with {} reference(s)",
            request.app_name,
            version,
            references.len()
        );

        let workspace = EphemeralWorkspace::create(self.work_dir.as_deref())?;
        let source_path = workspace.write(LOGICAL_SOURCE_NAME, &request.source)?;

        fs::create_dir_all(output_dir)?;
        let artifact = output_dir.join(format!("{}.dll", request.app_name));

        let output = self.emitter.emit(&EmitRequest {
            source_path: &source_path,
            output_path: &artifact,
            references: &references,
            // Always optimized; the requested mode only affects external builds.
            mode: BuildMode::Release,
            warnings_as_errors: &self.warnings_as_errors,
        })?;

        let has_errors = output.diagnostics.iter().any(Diagnostic::is_error);
        if !output.success || has_errors {
            let mut errors: Vec<Diagnostic> = output
                .diagnostics
                .into_iter()
                .filter(Diagnostic::is_error)
                .collect();
            if errors.is_empty() {
                errors.push(Diagnostic::error("compiler reported failure without diagnostics"));
            }
            tracing::debug!("{}: failed with {} error(s)", request.app_name, errors.len());
            return Err(Error::Compilation {
                message: format!("{} error(s) in {}", errors.len(), LOGICAL_SOURCE_NAME),
                diagnostics: errors,
            });
        }

        write_runtime_config(&artifact, version)?;
        copy_package_assemblies(&packages, output_dir)?;

        tracing::debug!("{}: succeeded", request.app_name);
        Ok(CompilationResult::succeeded(artifact, output.diagnostics))
    }

    fn strategy(&self) -> CompileStrategy {
        CompileStrategy::Embedded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::diagnostics::{Severity, SourceLocation};
    use crate::compile::emitter::EmitOutput;
    use crate::resolve::ResolverConfig;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Reference list and build mode of each emit.
    type CallLog = Arc<Mutex<Vec<(Vec<PathBuf>, BuildMode)>>>;

    /// Records emits and answers with canned diagnostics.
    struct FakeEmitter {
        calls: CallLog,
        diagnostics: Vec<Diagnostic>,
    }

    impl Emitter for FakeEmitter {
        fn emit(&self, request: &EmitRequest<'_>) -> Result<EmitOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((request.references.as_slice().to_vec(), request.mode));
            let success = !self.diagnostics.iter().any(Diagnostic::is_error);
            if success {
                fs::write(request.output_path, b"MZ")?;
            }
            Ok(EmitOutput {
                success,
                diagnostics: self.diagnostics.clone(),
            })
        }
    }

    fn compiler(temp: &TempDir, diagnostics: Vec<Diagnostic>) -> (EmbeddedCompiler, CallLog) {
        let refs = temp.path().join("ref");
        fs::create_dir_all(&refs).unwrap();
        for name in ["System.Runtime", "System.Console", "netstandard"] {
            fs::write(refs.join(format!("{}.dll", name)), b"").unwrap();
        }

        let calls = Arc::new(Mutex::new(Vec::new()));
        let config = CompilerConfig {
            work_dir: Some(temp.path().join("work")),
            resolver: ResolverConfig {
                sources: Vec::new(),
                ..ResolverConfig::with_cache_dir(temp.path().join("cache"))
            },
            ..CompilerConfig::embedded()
        };
        let compiler = EmbeddedCompiler::new(
            ToolchainManager::with_dotnet(temp.path().join("dotnet")),
            &config,
        )
        .unwrap()
        .with_reference_dir(refs)
        .with_emitter(Box::new(FakeEmitter {
            calls: Arc::clone(&calls),
            diagnostics,
        }));
        (compiler, calls)
    }

    const HELLO: &str = r#"
using System;

class Program
{
    static void Main()
    {
        Console.WriteLine("Hello, Compiled Code!");
    }
}
"#;

    #[test]
    fn test_top_level_statement_rejected_before_emit() {
        let temp = TempDir::new().unwrap();
        let (compiler, calls) = compiler(&temp, Vec::new());
        let request = CompilationRequest::new("using System;\nConsole.WriteLine(1);\n")
            .with_version(ToolchainVersion::V8);

        let err = compiler.compile(&request, &temp.path().join("out")).unwrap_err();
        match err {
            Error::UnsupportedConstruct { line, column, .. } => assert_eq!((line, column), (2, 1)),
            other => panic!("unexpected error: {other}"),
        }
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_success_writes_runtime_config() {
        let temp = TempDir::new().unwrap();
        let warning = Diagnostic {
            severity: Severity::Warning,
            code: Some("CS0168".to_string()),
            message: "The variable 'x' is declared but never used".to_string(),
            location: Some(SourceLocation {
                file: PathBuf::from("Program.cs"),
                line: 7,
                column: 13,
            }),
        };
        let (compiler, calls) = compiler(&temp, vec![warning]);
        let out = temp.path().join("out");
        let request = CompilationRequest::new(HELLO).with_version(ToolchainVersion::V8);

        let result = compiler.compile(&request, &out).unwrap();
        assert!(result.success);
        assert_eq!(result.artifact_path.as_deref(), Some(out.join("App.dll").as_path()));
        assert_eq!(result.warnings().count(), 1);

        let config: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("App.runtimeconfig.json")).unwrap())
                .unwrap();
        assert_eq!(config["runtimeOptions"]["tfm"], "net8.0");
        assert_eq!(config["runtimeOptions"]["framework"]["version"], "8.0.0");

        // Missing baseline assemblies are skipped.
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].0.len(), 3);
    }

    #[test]
    fn test_debug_request_is_still_optimized() {
        let temp = TempDir::new().unwrap();
        let (compiler, calls) = compiler(&temp, Vec::new());
        let request = CompilationRequest::new(HELLO)
            .with_version(ToolchainVersion::V8)
            .with_mode(BuildMode::Debug);

        assert!(compiler.compile(&request, &temp.path().join("out")).unwrap().success);
        assert_eq!(calls.lock().unwrap()[0].1, BuildMode::Release);
    }

    #[test]
    fn test_failure_carries_only_errors() {
        let temp = TempDir::new().unwrap();
        let (compiler, _) = compiler(
            &temp,
            vec![
                Diagnostic {
                    severity: Severity::Warning,
                    code: Some("CS0168".to_string()),
                    message: "unused".to_string(),
                    location: None,
                },
                Diagnostic {
                    severity: Severity::Error,
                    code: Some("CS0103".to_string()),
                    message: "The name 'x' does not exist in the current context".to_string(),
                    location: None,
                },
            ],
        );
        let request = CompilationRequest::new(HELLO).with_version(ToolchainVersion::V8);

        let err = compiler.compile(&request, &temp.path().join("out")).unwrap_err();
        assert_eq!(err.diagnostics().len(), 1);
        assert_eq!(err.diagnostics()[0].code.as_deref(), Some("CS0103"));
        assert!(!temp.path().join("out/App.runtimeconfig.json").exists());
    }

    #[test]
    fn test_workspace_removed() {
        let temp = TempDir::new().unwrap();
        let (compiler, _) = compiler(&temp, Vec::new());
        let request = CompilationRequest::new(HELLO).with_version(ToolchainVersion::V6);
        compiler.compile(&request, &temp.path().join("out")).unwrap();

        let work = temp.path().join("work");
        let leftover = fs::read_dir(&work).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftover, 0);
    }
}
