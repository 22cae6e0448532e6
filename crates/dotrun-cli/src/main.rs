//! dotrun CLI - compile and run C# snippets.

mod build;
mod colors;
mod kill;
mod run;
mod versions;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dotrun_core::compile::CompileStrategy;
use dotrun_core::resolve::PackageRequest;
use dotrun_core::toolchain::ToolchainVersion;

#[derive(Parser)]
#[command(name = "dotrun")]
#[command(about = "Compile and run C# snippets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed .NET runtime versions
    Versions {
        /// Path to the dotnet executable
        #[arg(long)]
        dotnet: Option<PathBuf>,
    },

    /// Compile a C# file
    Compile {
        /// Path to the source (.cs file)
        file: PathBuf,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Compile a C# file and run the result
    Run {
        /// Path to the source (.cs file)
        file: PathBuf,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Kill running processes of a compiled artifact
    Kill {
        /// Artifact path or process name
        name: PathBuf,
    },
}

/// Options shared by `compile` and `run`.
#[derive(Args, Clone, Debug)]
pub struct BuildArgs {
    /// Compilation strategy (embedded or external)
    #[arg(long, default_value = "external")]
    pub strategy: CompileStrategy,

    /// Target .NET version (auto, 5-9)
    #[arg(long = "version", value_name = "VERSION", default_value = "auto")]
    pub target: ToolchainVersion,

    /// Build without optimizations
    #[arg(long)]
    pub debug: bool,

    /// NuGet package to reference (Id@Version), repeatable
    #[arg(short, long = "package", value_name = "ID@VERSION")]
    pub packages: Vec<PackageRequest>,

    /// Package source (URL or local directory), repeatable; replaces nuget.org
    #[arg(long = "source", value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Output directory (default: .dotrun/build/<name> next to the source)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Warning codes to treat as errors (e.g. CS0168), repeatable
    #[arg(long = "warnaserror", value_name = "CODE")]
    pub warnings_as_errors: Vec<String>,

    /// Path to the dotnet executable
    #[arg(long)]
    pub dotnet: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Helper to format dotrun-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<dotrun_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Versions { dotnet } => {
            versions::execute(dotnet.as_deref()).map_err(format_error)?;
        }

        Commands::Compile { file, build: args } => {
            build::execute(file, args).await.map_err(format_error)?;
        }

        Commands::Run { file, build: args } => {
            run::execute(file, args).await.map_err(format_error)?;
        }

        Commands::Kill { name } => kill::execute(&name).map_err(format_error)?,
    }

    Ok(())
}
