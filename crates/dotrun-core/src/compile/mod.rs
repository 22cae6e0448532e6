//! Compilation pipeline for C# snippets.
//!
//! This module provides:
//! - Source outline validation (top-level statement rejection)
//! - The embedded strategy (Roslyn driven directly against reference packs)
//! - The external strategy (generated project + `dotnet build`)
//! - Diagnostic mapping (compiler output → structured diagnostics)
//!
//! # Architecture
//!
//! ```text
//! CompilationRequest
//!     │
//!     ├── Embedded ──► SourceOutline ──► references (pack + DependencyResolver) ──► Emitter ──► App.dll
//!     │
//!     └── External ──► EphemeralWorkspace (App.csproj, Program.cs) ──► dotnet build ──► out/
//! ```

mod compiler;
mod diagnostics;
mod embedded;
mod emitter;
mod external;
mod manifest;
mod outline;
mod types;
mod workspace;

pub use compiler::Compiler;
pub use diagnostics::{Diagnostic, DiagnosticMapper, LOGICAL_SOURCE_NAME, Severity, SourceLocation};
pub use embedded::{BASELINE_REFERENCES, EmbeddedCompiler};
pub use emitter::{EmitOutput, EmitRequest, Emitter, RoslynEmitter};
pub use external::ExternalBuilder;
pub use manifest::{ProjectConfig, generate_csproj};
pub use outline::{ItemKind, OutlineItem, SourceOutline, TOP_LEVEL_STATEMENT_MESSAGE};
pub use types::{
    CompilationBackend, CompilationRequest, CompilationResult, CompileStrategy, CompilerConfig,
    DEFAULT_APP_NAME,
};
pub use workspace::EphemeralWorkspace;
