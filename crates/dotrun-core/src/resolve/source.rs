//! Package identities and the registry capability.
//!
//! The resolver never speaks a registry protocol directly; it goes through
//! [`PackageSource`], implemented by [`super::LocalFeed`] and
//! [`super::RemoteFeed`] (and by in-memory fakes in tests).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Error, Result};

use super::version::{PackageVersion, VersionRange};

/// A package id paired with an exact version.
///
/// Ids compare case-insensitively, as the registry treats them.
#[derive(Debug, Clone, Eq)]
pub struct PackageIdentity {
    pub id: String,
    pub version: PackageVersion,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: PackageVersion) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Lowercase id, used for cache paths, feed URLs and map keys.
    pub fn lower_id(&self) -> String {
        self.id.to_ascii_lowercase()
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq_ignore_ascii_case(&other.id) && self.version == other.version
    }
}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lower_id().hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// A root package requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRequest {
    pub id: String,
    pub version: PackageVersion,
}

impl PackageRequest {
    pub fn new(id: impl Into<String>, version: PackageVersion) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.id.clone(), self.version.clone())
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

impl FromStr for PackageRequest {
    type Err = Error;

    /// Parse `Id@Version` (or `Id/Version`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (id, version) = s
            .split_once('@')
            .or_else(|| s.split_once('/'))
            .ok_or_else(|| {
                Error::PackageResolution(format!(
                    "invalid package reference '{}' (expected Id@Version)",
                    s
                ))
            })?;

        let id = id.trim();
        if id.is_empty() {
            return Err(Error::PackageResolution(format!(
                "invalid package reference '{}': empty id",
                s
            )));
        }

        Ok(Self::new(id, version.trim().parse()?))
    }
}

/// A declared dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageDependency {
    pub id: String,
    pub range: VersionRange,
}

impl PackageDependency {
    pub fn new(id: impl Into<String>, range: VersionRange) -> Self {
        Self {
            id: id.into(),
            range,
        }
    }

    /// The identity discovery recurses into: the range's minimum version.
    pub fn discovery_identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.id.clone(), self.range.min_version())
    }
}

/// Dependency metadata for one package at one target framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    pub identity: PackageIdentity,
    pub dependencies: Vec<PackageDependency>,
}

/// The registry capability.
pub trait PackageSource: Send + Sync {
    /// Display name for logs and errors.
    fn name(&self) -> &str;

    /// Whether the source lives on the local filesystem.
    fn is_local(&self) -> bool;

    /// Dependency metadata, or `None` if the source does not have the package.
    fn dependency_info(
        &self,
        identity: &PackageIdentity,
        framework: &str,
    ) -> Result<Option<DependencyInfo>>;

    /// Raw `.nupkg` content.
    fn download(&self, identity: &PackageIdentity) -> Result<Vec<u8>>;
}
