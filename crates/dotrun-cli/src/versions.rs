//! Versions command implementation for dotrun CLI.

use std::path::Path;

use dotrun_core::toolchain::{ToolchainManager, ToolchainVersion, select_version};

use crate::colors;

/// List installed runtime versions and what `auto` selects.
pub fn execute(dotnet: Option<&Path>) -> anyhow::Result<()> {
    let toolchain = ToolchainManager::new(dotnet)?;
    let installed = toolchain.installed_versions();

    println!(
        "{}dotnet{} {}",
        colors::BOLD,
        colors::RESET,
        toolchain.dotnet_path().display()
    );

    if installed.is_empty() {
        println!(
            "{}No .NET runtime 5 or newer found.{}",
            colors::YELLOW,
            colors::RESET
        );
        return Ok(());
    }

    let auto = select_version(ToolchainVersion::Auto, &installed);
    for version in &installed {
        let marker = if Some(*version) == auto { " (auto)" } else { "" };
        let tfm = version.target_framework().unwrap_or_default();
        println!(
            "  {}{}{}  {}{}",
            colors::CYAN,
            version,
            colors::RESET,
            tfm,
            marker
        );
    }

    match toolchain.list_sdks() {
        Ok(sdks) if !sdks.is_empty() => {
            println!("{}SDKs{}", colors::BOLD, colors::RESET);
            for sdk in sdks {
                println!("  {}", sdk.version);
            }
        }
        Ok(_) => println!("{}No SDK installed (run only){}", colors::DIM, colors::RESET),
        Err(e) => tracing::debug!("SDK listing failed: {}", e),
    }

    Ok(())
}
