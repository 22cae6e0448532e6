//! `.nuspec` manifest parsing.
//!
//! Only the parts the resolver needs are read: id, version and the
//! dependency groups.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{Error, Result};

use super::framework::{compatible_frameworks, normalize_framework};
use super::source::PackageDependency;
use super::version::{PackageVersion, VersionRange};

/// Dependencies declared for one target framework (or for all, when
/// `target_framework` is `None`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGroup {
    pub target_framework: Option<String>,
    pub dependencies: Vec<PackageDependency>,
}

/// Parsed package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nuspec {
    pub id: String,
    pub version: PackageVersion,
    pub dependency_groups: Vec<DependencyGroup>,
}

impl Nuspec {
    /// Parse manifest XML.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut id = None;
        let mut version = None;
        let mut groups: Vec<DependencyGroup> = Vec::new();
        // Dependencies listed directly under <dependencies> (legacy layout).
        let mut flat = DependencyGroup {
            target_framework: None,
            dependencies: Vec::new(),
        };

        let mut path: Vec<Vec<u8>> = Vec::new();
        let mut current_group: Option<DependencyGroup> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::Manifest(format!("malformed nuspec: {}", e)))?;

            match event {
                Event::Start(e) => {
                    let name = e.local_name().as_ref().to_vec();
                    match name.as_slice() {
                        b"group" if in_dependencies(&path) => {
                            current_group = Some(DependencyGroup {
                                target_framework: attribute(&e, "targetFramework")?
                                    .map(|tfm| normalize_framework(&tfm)),
                                dependencies: Vec::new(),
                            });
                        }
                        b"dependency" => {
                            push_dependency(&e, &path, &mut current_group, &mut flat)?
                        }
                        _ => {}
                    }
                    path.push(name);
                }
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"group" if in_dependencies(&path) => groups.push(DependencyGroup {
                        target_framework: attribute(&e, "targetFramework")?
                            .map(|tfm| normalize_framework(&tfm)),
                        dependencies: Vec::new(),
                    }),
                    b"dependency" => push_dependency(&e, &path, &mut current_group, &mut flat)?,
                    _ => {}
                },
                Event::End(e) => {
                    if e.local_name().as_ref() == b"group" {
                        if let Some(group) = current_group.take() {
                            groups.push(group);
                        }
                    }
                    path.pop();
                }
                Event::Text(t) => {
                    let in_metadata = path.len() >= 2 && path[path.len() - 2] == b"metadata";
                    if in_metadata {
                        let text = t
                            .unescape()
                            .map_err(|e| Error::Manifest(format!("malformed nuspec: {}", e)))?;
                        match path.last().map(Vec::as_slice) {
                            Some(b"id") => id = Some(text.trim().to_string()),
                            Some(b"version") => version = Some(text.trim().parse()?),
                            _ => {}
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !flat.dependencies.is_empty() {
            groups.push(flat);
        }

        Ok(Self {
            id: id.ok_or_else(|| Error::Manifest("nuspec has no <id>".to_string()))?,
            version: version
                .ok_or_else(|| Error::Manifest("nuspec has no <version>".to_string()))?,
            dependency_groups: groups,
        })
    }

    /// Dependencies that apply when targeting `framework`.
    ///
    /// Picks the nearest compatible framework group, falling back to the
    /// framework-agnostic group. No match means no dependencies.
    pub fn dependencies_for(&self, framework: &str) -> &[PackageDependency] {
        for candidate in compatible_frameworks(framework) {
            if let Some(group) = self
                .dependency_groups
                .iter()
                .find(|g| g.target_framework.as_deref() == Some(candidate.as_str()))
            {
                return &group.dependencies;
            }
        }

        self.dependency_groups
            .iter()
            .find(|g| g.target_framework.is_none())
            .map(|g| g.dependencies.as_slice())
            .unwrap_or(&[])
    }
}

fn in_dependencies(path: &[Vec<u8>]) -> bool {
    path.last().is_some_and(|name| name == b"dependencies")
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|e| Error::Manifest(format!("malformed attribute '{}': {}", name, e)))?;

    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Manifest(format!("malformed attribute '{}': {}", name, e)))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

fn push_dependency(
    element: &BytesStart<'_>,
    path: &[Vec<u8>],
    group: &mut Option<DependencyGroup>,
    flat: &mut DependencyGroup,
) -> Result<()> {
    let Some(id) = attribute(element, "id")? else {
        return Err(Error::Manifest("<dependency> without id".to_string()));
    };
    let range = match attribute(element, "version")? {
        Some(v) if !v.trim().is_empty() => v.parse::<VersionRange>()?,
        _ => VersionRange::any(),
    };
    let dependency = PackageDependency::new(id, range);

    match group {
        Some(group) => group.dependencies.push(dependency),
        None if in_dependencies(path) => flat.dependencies.push(dependency),
        None => {}
    }
    Ok(())
}
