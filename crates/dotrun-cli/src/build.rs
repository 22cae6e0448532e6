//! Compile command implementation for dotrun CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use dotrun_core::compile::{CompilationResult, Compiler, CompilerConfig, DEFAULT_APP_NAME};
use dotrun_core::paths::ProjectDirs;
use dotrun_core::resolve::SourceConfig;
use dotrun_core::toolchain::BuildMode;

use crate::BuildArgs;
use crate::colors;

/// Assembly name derived from the source file name.
pub fn app_name(file: &Path) -> String {
    let name: String = file
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();

    if name.is_empty() {
        DEFAULT_APP_NAME.to_string()
    } else {
        name
    }
}

/// Map command-line options onto a compiler configuration.
pub fn config_for(dirs: &ProjectDirs, file: &Path, args: &BuildArgs) -> CompilerConfig {
    let mut config = CompilerConfig::for_project(dirs, args.strategy);
    config.app_name = app_name(file);
    config.dotnet_path = args.dotnet.clone();
    config.warnings_as_errors = args.warnings_as_errors.clone();
    if !args.sources.is_empty() {
        config.resolver.sources = args.sources.iter().map(|s| SourceConfig::parse(s)).collect();
    }
    config
}

/// Compile `file`. Blocks on the toolchain and package feeds.
pub fn compile_file(file: &Path, args: &BuildArgs) -> anyhow::Result<CompilationResult> {
    let source = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let dirs = ProjectDirs::from_source_path(file)?;

    let compiler = Compiler::new(config_for(&dirs, file, args))?;
    let mode = if args.debug {
        BuildMode::Debug
    } else {
        BuildMode::Release
    };
    let request = compiler
        .request(source)
        .with_version(args.target)
        .with_mode(mode)
        .with_packages(args.packages.clone());

    let output_dir: PathBuf = args
        .output
        .clone()
        .unwrap_or_else(|| dirs.output_dir(&compiler.config().app_name));

    Ok(compiler.compile_to_result(&request, &output_dir)?)
}

pub fn print_header(action: &str, file: &Path) {
    println!(
        "\n{}dotrun{} - {} {}{}{}",
        colors::BOLD,
        colors::RESET,
        action,
        colors::CYAN,
        file.display(),
        colors::RESET
    );
    println!("{}", "─".repeat(50));
}

/// Print diagnostics and the outcome line.
pub fn report(result: &CompilationResult, elapsed: std::time::Duration) {
    for diagnostic in &result.diagnostics {
        eprintln!("{}", diagnostic.format_terminal());
    }

    match &result.artifact_path {
        Some(artifact) if result.success => println!(
            "{}Compiled{} {} in {:.2}s",
            colors::GREEN,
            colors::RESET,
            artifact.display(),
            elapsed.as_secs_f64()
        ),
        _ => println!(
            "{}Failed{} with {} error(s)",
            colors::RED,
            colors::RESET,
            result.errors().count()
        ),
    }
}

/// Compile off the async runtime and report the result.
pub async fn compile_reported(file: PathBuf, args: BuildArgs) -> anyhow::Result<CompilationResult> {
    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || compile_file(&file, &args)).await??;
    report(&result, start.elapsed());
    Ok(result)
}

/// Execute the compile command.
pub async fn execute(file: PathBuf, args: BuildArgs) -> anyhow::Result<()> {
    print_header("Compiling", &file);

    let result = compile_reported(file, args).await?;
    if !result.success {
        anyhow::bail!("compilation failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_name() {
        assert_eq!(app_name(Path::new("/src/hello.cs")), "hello");
        assert_eq!(app_name(Path::new("my app!.cs")), "myapp");
        assert_eq!(app_name(Path::new("!!!.cs")), "App");
    }
}
