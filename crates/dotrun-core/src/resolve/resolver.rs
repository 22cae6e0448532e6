//! Transitive package resolution.
//!
//! Three phases:
//!
//! 1. **Discovery** walks the dependency graph depth-first from the roots,
//!    asking sources for metadata at each dependency range's minimum version.
//!    Each identity is queried once.
//! 2. **Selection** picks one version per package id. Roots are pinned; every
//!    other id gets the candidate the [`DependencyBehavior`] prefers among
//!    those satisfying every range declared on it by selected packages.
//! 3. **Materialization** downloads each selected package once, extracts it
//!    into the cache and collects its reference assemblies.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paths::package_cache_dir;

use super::extract::{extract_package, is_extracted};
use super::framework::{DEFAULT_FRAMEWORK_ORDER, DEPENDENCY_FRAMEWORK};
use super::local::LocalFeed;
use super::references::{ReferenceSet, package_assemblies};
use super::remote::{NUGET_ORG, RemoteFeed};
use super::source::{
    DependencyInfo, PackageDependency, PackageIdentity, PackageRequest, PackageSource,
};
use super::version::VersionRange;

/// Which version to choose among those satisfying all constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyBehavior {
    /// Lowest applicable version.
    #[default]
    Lowest,
    /// Highest discovered applicable version.
    Highest,
}

impl fmt::Display for DependencyBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lowest => write!(f, "lowest"),
            Self::Highest => write!(f, "highest"),
        }
    }
}

impl FromStr for DependencyBehavior {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowest" => Ok(Self::Lowest),
            "highest" => Ok(Self::Highest),
            other => Err(Error::PackageResolution(format!(
                "unknown dependency behavior '{}' (expected lowest or highest)",
                other
            ))),
        }
    }
}

/// A configured package source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "location")]
pub enum SourceConfig {
    /// Directory of `.nupkg` files.
    Local(PathBuf),
    /// Service index or flat container URL.
    Remote(String),
}

impl SourceConfig {
    /// Interpret a command-line value: URLs are remote, anything else a path.
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Remote(value.to_string())
        } else {
            Self::Local(PathBuf::from(value))
        }
    }

    fn build(&self) -> Result<Box<dyn PackageSource>> {
        Ok(match self {
            Self::Local(path) => Box::new(LocalFeed::new(path)),
            Self::Remote(url) => Box::new(RemoteFeed::new(url)?),
        })
    }
}

/// Resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Sources in query order; the first that answers wins.
    pub sources: Vec<SourceConfig>,

    /// Shared package cache.
    pub cache_dir: PathBuf,

    /// Framework used to select dependency groups.
    pub dependency_framework: String,

    /// `lib/` subdirectories probed for reference assemblies, in order.
    pub framework_order: Vec<String>,

    pub behavior: DependencyBehavior,

    /// Skip the download when the cache already holds a complete extraction.
    pub reuse_cache: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            sources: vec![SourceConfig::Remote(NUGET_ORG.to_string())],
            cache_dir: package_cache_dir(),
            dependency_framework: DEPENDENCY_FRAMEWORK.to_string(),
            framework_order: DEFAULT_FRAMEWORK_ORDER.iter().map(|s| s.to_string()).collect(),
            behavior: DependencyBehavior::default(),
            reuse_cache: true,
        }
    }
}

impl ResolverConfig {
    /// Configuration with a specific cache directory.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }
}

/// A package selected by resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub identity: PackageIdentity,

    /// Declared dependencies for the dependency framework.
    pub dependencies: Vec<PackageDependency>,

    /// Index into the resolver's sources of the source that answered.
    pub source_index: usize,

    /// Extraction directory, set once materialized.
    pub extraction_dir: Option<PathBuf>,
}

/// Output of discovery: every reachable identity that some source answered for.
struct DiscoveryGraph {
    graph: DiGraph<ResolvedPackage, VersionRange>,
    index: FxHashMap<PackageIdentity, NodeIndex>,
}

impl DiscoveryGraph {
    /// Discovered versions of an id, ordered by preference.
    fn candidates(&self, lower_id: &str, behavior: DependencyBehavior) -> Vec<NodeIndex> {
        let mut nodes: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| self.graph[n].identity.lower_id() == lower_id)
            .collect();
        nodes.sort_by(|&a, &b| {
            let ord = self.graph[a]
                .identity
                .version
                .cmp(&self.graph[b].identity.version);
            match behavior {
                DependencyBehavior::Lowest => ord,
                DependencyBehavior::Highest => ord.reverse(),
            }
        });
        nodes
    }
}

/// Resolves package requests into reference assemblies.
pub struct DependencyResolver {
    sources: Vec<Box<dyn PackageSource>>,
    config: ResolverConfig,
}

impl DependencyResolver {
    /// Build the configured sources.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let sources = config
            .sources
            .iter()
            .map(SourceConfig::build)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sources, config })
    }

    /// Use pre-built sources; `config.sources` is ignored.
    pub fn with_sources(sources: Vec<Box<dyn PackageSource>>, config: ResolverConfig) -> Self {
        Self { sources, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve the closure of `roots` into an ordered reference set.
    ///
    /// Empty `roots` yields an empty set without touching any source.
    pub fn resolve(&self, roots: &[PackageRequest]) -> Result<ReferenceSet> {
        let packages = self.resolve_packages(roots)?;

        let mut references = ReferenceSet::new();
        for package in &packages {
            let Some(dir) = &package.extraction_dir else {
                continue;
            };
            let assemblies = package_assemblies(dir, &self.config.framework_order);
            if assemblies.is_empty() {
                tracing::debug!("{} contributes no reference assemblies", package.identity);
            }
            references.extend(assemblies);
        }

        tracing::info!(
            "Resolved {} package(s), {} reference(s)",
            packages.len(),
            references.len()
        );
        Ok(references)
    }

    /// Resolve and materialize the closure of `roots`, in discovery order.
    pub fn resolve_packages(&self, roots: &[PackageRequest]) -> Result<Vec<ResolvedPackage>> {
        if roots.is_empty() {
            return Ok(Vec::new());
        }
        if self.sources.is_empty() {
            return Err(Error::PackageResolution(
                "no package sources configured".to_string(),
            ));
        }

        let roots: Vec<PackageIdentity> = roots.iter().map(PackageRequest::identity).collect();
        let discovered = self.discover(&roots)?;
        let selected = self.select(&discovered, &roots)?;

        let mut packages = Vec::with_capacity(selected.len());
        for node in selected {
            let mut package = discovered.graph[node].clone();
            package.extraction_dir = Some(self.materialize(&package)?);
            packages.push(package);
        }
        Ok(packages)
    }

    /// Depth-first discovery with an explicit stack and visited set.
    fn discover(&self, roots: &[PackageIdentity]) -> Result<DiscoveryGraph> {
        let framework = &self.config.dependency_framework;
        let mut graph: DiGraph<ResolvedPackage, VersionRange> = DiGraph::new();
        let mut index: FxHashMap<PackageIdentity, NodeIndex> = FxHashMap::default();
        let mut unavailable: FxHashSet<PackageIdentity> = FxHashSet::default();

        let root_set: FxHashSet<&PackageIdentity> = roots.iter().collect();
        let mut stack: Vec<PackageIdentity> = roots.iter().rev().cloned().collect();

        while let Some(identity) = stack.pop() {
            if index.contains_key(&identity) || unavailable.contains(&identity) {
                continue;
            }

            let Some((source_index, info)) = self.query_sources(&identity, framework) else {
                if root_set.contains(&identity) {
                    let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
                    return Err(Error::PackageResolution(format!(
                        "{} was not found in any source ({})",
                        identity,
                        names.join(", ")
                    )));
                }
                tracing::warn!("Dependency {} not found in any source, skipping", identity);
                unavailable.insert(identity);
                continue;
            };

            tracing::debug!(
                "Discovered {} from {} ({} dependencies)",
                info.identity,
                self.sources[source_index].name(),
                info.dependencies.len()
            );

            for dependency in info.dependencies.iter().rev() {
                stack.push(dependency.discovery_identity());
            }

            let node = graph.add_node(ResolvedPackage {
                identity: info.identity,
                dependencies: info.dependencies,
                source_index,
                extraction_dir: None,
            });
            index.insert(identity, node);
        }

        let edges: Vec<(NodeIndex, NodeIndex, VersionRange)> = graph
            .node_indices()
            .flat_map(|from| {
                graph[from]
                    .dependencies
                    .iter()
                    .filter_map(|dep| {
                        let to = *index.get(&dep.discovery_identity())?;
                        Some((from, to, dep.range.clone()))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        for (from, to, range) in edges {
            graph.add_edge(from, to, range);
        }

        Ok(DiscoveryGraph { graph, index })
    }

    /// First source with metadata for the identity. Source errors are logged
    /// and treated as "not found here".
    fn query_sources(
        &self,
        identity: &PackageIdentity,
        framework: &str,
    ) -> Option<(usize, DependencyInfo)> {
        for (i, source) in self.sources.iter().enumerate() {
            match source.dependency_info(identity, framework) {
                Ok(Some(info)) => return Some((i, info)),
                Ok(None) => {}
                Err(e) => tracing::warn!("Source {} failed for {}: {}", source.name(), identity, e),
            }
        }
        None
    }

    /// Choose one node per package id, iterating until the choice is stable.
    fn select(
        &self,
        discovered: &DiscoveryGraph,
        roots: &[PackageIdentity],
    ) -> Result<Vec<NodeIndex>> {
        let behavior = self.config.behavior;
        let mut candidates: FxHashMap<String, Vec<NodeIndex>> = FxHashMap::default();
        let mut candidates_for = |id: &str| -> Vec<NodeIndex> {
            candidates
                .entry(id.to_string())
                .or_insert_with(|| discovered.candidates(id, behavior))
                .clone()
        };

        let mut pinned: FxHashMap<String, NodeIndex> = FxHashMap::default();
        for root in roots {
            if let Some(&node) = discovered.index.get(root) {
                pinned.entry(root.lower_id()).or_insert(node);
            }
        }

        let mut preferred: FxHashMap<String, NodeIndex> = FxHashMap::default();
        let max_rounds = discovered.graph.node_count() + 1;

        for _ in 0..max_rounds {
            let mut chosen = pinned.clone();
            let mut constraints: FxHashMap<String, Vec<VersionRange>> = FxHashMap::default();
            let mut queue: VecDeque<NodeIndex> = pinned.values().copied().collect();
            let mut visited: FxHashSet<NodeIndex> = FxHashSet::default();

            while let Some(node) = queue.pop_front() {
                if !visited.insert(node) {
                    continue;
                }
                // Edges only exist towards discovered packages; undiscovered
                // dependencies were skipped with a warning.
                for edge in discovered.graph.edges(node) {
                    let range = edge.weight();
                    let id = discovered.graph[edge.target()].identity.lower_id();
                    constraints.entry(id.clone()).or_default().push(range.clone());
                    if chosen.contains_key(&id) {
                        continue;
                    }

                    let nodes = candidates_for(&id);
                    let pick = preferred.get(&id).copied().or_else(|| {
                        nodes
                            .iter()
                            .copied()
                            .find(|&n| range.satisfies(&discovered.graph[n].identity.version))
                    });
                    if let Some(pick) = pick {
                        chosen.insert(id, pick);
                        queue.push_back(pick);
                    }
                }
            }

            let mut changed = false;
            for (id, ranges) in &constraints {
                let nodes = candidates_for(id);

                if let Some(&node) = pinned.get(id) {
                    let version = &discovered.graph[node].identity.version;
                    if let Some(range) = ranges.iter().find(|r| !r.satisfies(version)) {
                        tracing::warn!(
                            "Requested {} does not satisfy dependency range {}",
                            discovered.graph[node].identity,
                            range
                        );
                    }
                    continue;
                }

                let best = nodes.iter().copied().find(|&n| {
                    let version = &discovered.graph[n].identity.version;
                    ranges.iter().all(|r| r.satisfies(version))
                });
                let Some(best) = best else {
                    let ranges: Vec<String> = ranges.iter().map(|r| r.to_string()).collect();
                    return Err(Error::PackageResolution(format!(
                        "no discovered version of {} satisfies all of {}",
                        id,
                        ranges.join(", ")
                    )));
                };

                if chosen.get(id) != Some(&best) {
                    preferred.insert(id.clone(), best);
                    changed = true;
                }
            }

            if !changed {
                let mut selected: Vec<NodeIndex> = chosen.into_values().collect();
                selected.sort();
                return Ok(selected);
            }
        }

        Err(Error::PackageResolution(
            "version selection did not converge".to_string(),
        ))
    }

    /// Download and extract one package into the cache.
    fn materialize(&self, package: &ResolvedPackage) -> Result<PathBuf> {
        let dir = self.package_dir(&package.identity);

        if self.config.reuse_cache && is_extracted(&dir) {
            tracing::debug!("{} already in cache at {}", package.identity, dir.display());
            return Ok(dir);
        }

        // Download from the first source of the same kind as the one that
        // answered discovery.
        let wants_local = self.sources[package.source_index].is_local();
        let source = self
            .sources
            .iter()
            .find(|s| s.is_local() == wants_local)
            .unwrap_or(&self.sources[package.source_index]);

        tracing::info!("Downloading {} from {}", package.identity, source.name());
        let bytes = source.download(&package.identity)?;
        extract_package(&bytes, &dir)?;
        Ok(dir)
    }

    /// `<cache>/<id-lowercase>/<normalized-version>`.
    pub fn package_dir(&self, identity: &PackageIdentity) -> PathBuf {
        package_dir(&self.config.cache_dir, identity)
    }
}

/// Cache directory of one package.
pub fn package_dir(cache_dir: &Path, identity: &PackageIdentity) -> PathBuf {
    cache_dir
        .join(identity.lower_id())
        .join(identity.version.to_normalized_string().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behavior_parse() {
        assert_eq!("Lowest".parse::<DependencyBehavior>().unwrap(), DependencyBehavior::Lowest);
        assert_eq!("highest".parse::<DependencyBehavior>().unwrap(), DependencyBehavior::Highest);
        assert!("newest".parse::<DependencyBehavior>().is_err());
    }

    #[test]
    fn test_source_config_parse() {
        assert_eq!(
            SourceConfig::parse("https://api.nuget.org/v3/index.json"),
            SourceConfig::Remote("https://api.nuget.org/v3/index.json".to_string())
        );
        assert_eq!(
            SourceConfig::parse("./packages"),
            SourceConfig::Local(PathBuf::from("./packages"))
        );
    }

    #[test]
    fn test_package_dir_layout() {
        let identity = PackageIdentity::new("Newtonsoft.Json", "13.0.1.0".parse().unwrap());
        assert_eq!(
            package_dir(Path::new("/cache"), &identity),
            PathBuf::from("/cache/newtonsoft.json/13.0.1")
        );
    }

    #[test]
    fn test_empty_roots() {
        let resolver = DependencyResolver::with_sources(Vec::new(), ResolverConfig::default());
        assert!(resolver.resolve(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_no_sources_is_error() {
        let resolver = DependencyResolver::with_sources(Vec::new(), ResolverConfig::default());
        let root = PackageRequest::new("A", "1.0.0".parse().unwrap());
        assert!(matches!(
            resolver.resolve(&[root]),
            Err(Error::PackageResolution(_))
        ));
    }
}
