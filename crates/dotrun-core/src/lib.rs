//! Core engine for dotrun, a compile-and-run service for C# snippets.
//!
//! This crate provides:
//! - Toolchain discovery and version selection
//! - NuGet dependency resolution into reference assemblies
//! - Compilation through an embedded compiler or `dotnet build`
//! - Supervision of the produced artifact

pub mod compile;
pub mod error;
pub mod execute;
pub mod paths;
pub mod resolve;
pub mod toolchain;

pub use compile::{
    CompilationBackend, CompilationRequest, CompilationResult, CompileStrategy, Compiler,
    CompilerConfig, Diagnostic,
};
pub use error::{Error, Result};
pub use execute::{KillOutcome, ProcessEvent, ProcessEvents, ProcessSupervisor, kill_by_name};
pub use paths::ProjectDirs;
pub use resolve::{DependencyResolver, PackageRequest, ReferenceSet, ResolverConfig};
pub use toolchain::{BuildMode, ToolchainManager, ToolchainVersion, VersionProbe};
