//! Toolchain discovery and selection.
//!
//! - `version` - Target versions (`Auto`, .NET 5-9) and build modes
//! - `probe` - Installed runtime discovery via `dotnet --list-runtimes`
//! - `manager` - Host, SDK, compiler and reference pack lookup

mod manager;
mod probe;
mod version;

pub use manager::{DOTNET_ENV, SdkInstall, ToolchainManager, parse_sdk_list};
pub use probe::{
    DEFAULT_PROBE_TIMEOUT, RUNTIME_PREFIXES, VersionProbe, parse_runtime_list, select_version,
};
pub use version::{BuildMode, ToolchainVersion};
