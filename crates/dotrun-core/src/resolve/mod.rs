//! Package dependency resolution.
//!
//! Turns a list of root package requests into the reference assemblies the
//! compiler needs:
//!
//! - `version` - Package versions and interval ranges
//! - `source` - Identities and the [`PackageSource`] capability
//! - `local`, `remote` - Filesystem and HTTP feeds
//! - `nuspec` - Manifest parsing and dependency group selection
//! - `resolver` - Discovery, version selection, materialization
//! - `extract` - Archive extraction into the package cache
//! - `references` - Framework probing and the ordered reference set

mod extract;
mod framework;
mod local;
mod nuspec;
mod references;
mod remote;
mod resolver;
mod source;
mod version;

pub use extract::{COMPLETE_MARKER, extract_package, is_extracted};
pub use framework::{
    DEFAULT_FRAMEWORK_ORDER, DEPENDENCY_FRAMEWORK, compatible_frameworks, normalize_framework,
};
pub use local::LocalFeed;
pub use nuspec::{DependencyGroup, Nuspec};
pub use references::{ReferenceSet, package_assemblies};
pub use remote::{NUGET_ORG, RemoteFeed};
pub use resolver::{
    DependencyBehavior, DependencyResolver, ResolvedPackage, ResolverConfig, SourceConfig,
    package_dir,
};
pub use source::{
    DependencyInfo, PackageDependency, PackageIdentity, PackageRequest, PackageSource,
};
pub use version::{PackageVersion, VersionRange};
