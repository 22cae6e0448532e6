//! Run command implementation for dotrun CLI.
//!
//! Compiles the source, then streams the artifact's output until it exits
//! or Ctrl-C stops it.

use std::path::{Path, PathBuf};

use dotrun_core::ToolchainManager;
use dotrun_core::execute::{ProcessEvent, ProcessSupervisor};

use crate::BuildArgs;
use crate::build;
use crate::colors;

/// Execute the run command.
pub async fn execute(file: PathBuf, args: BuildArgs) -> anyhow::Result<()> {
    build::print_header("Running", &file);

    // Assemblies run on the same host that built them.
    let toolchain = ToolchainManager::new(args.dotnet.as_deref())?;
    let result = build::compile_reported(file, args).await?;
    let Some(artifact) = result.artifact_path.filter(|_| result.success) else {
        anyhow::bail!("compilation failed");
    };
    let working_dir = artifact
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    println!("{}", "─".repeat(50));

    let mut supervisor = ProcessSupervisor::with_dotnet(toolchain.dotnet_path());
    let mut events = supervisor.execute(&artifact, &working_dir).await;
    let mut exit_code = None;
    let mut launch_failed = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ProcessEvent::Output(line)) => {
                    println!("{}│{} {}", colors::DIM, colors::RESET, line);
                }
                Some(ProcessEvent::Error(line)) => {
                    if !supervisor.is_running() && exit_code.is_none() {
                        launch_failed = true;
                    }
                    eprintln!("{}│{} {}", colors::RED, colors::RESET, line);
                }
                Some(ProcessEvent::Exited(code)) => exit_code = Some(code),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}Interrupted{}", colors::YELLOW, colors::RESET);
                supervisor.stop().await;
            }
        }
    }
    supervisor.stop().await;

    println!("{}", "─".repeat(50));
    match exit_code {
        Some(Some(0)) => {
            println!("{}Exited{} with code 0", colors::GREEN, colors::RESET);
            Ok(())
        }
        Some(Some(code)) => anyhow::bail!("process exited with code {}", code),
        Some(None) => anyhow::bail!("process was terminated"),
        None if launch_failed => anyhow::bail!("failed to launch {}", artifact.display()),
        None => anyhow::bail!("process ended without an exit status"),
    }
}
