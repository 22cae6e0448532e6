//! Filesystem package feed.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::nuspec::Nuspec;
use super::source::{DependencyInfo, PackageIdentity, PackageSource};
use super::version::PackageVersion;

/// A directory of `.nupkg` files.
///
/// Both layouts the package tooling produces are understood: flat
/// (`<root>/<id>.<version>.nupkg`) and hierarchical
/// (`<root>/<id>/<version>/<id>.<version>.nupkg`). Names match
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct LocalFeed {
    name: String,
    root: PathBuf,
}

impl LocalFeed {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: root.display().to_string(),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate the archive for an identity.
    fn find_package(&self, identity: &PackageIdentity) -> Option<PathBuf> {
        let lower_id = identity.lower_id();

        if let Some(path) = find_in_dir(&self.root, &lower_id, &identity.version) {
            return Some(path);
        }

        let id_dir = fs::read_dir(&self.root)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .find(|path| {
                path.is_dir()
                    && path
                        .file_name()
                        .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(&identity.id))
            })?;

        fs::read_dir(&id_dir)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_dir()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str()?.parse::<PackageVersion>().ok())
                        .is_some_and(|v| v == identity.version)
            })
            .find_map(|dir| find_in_dir(&dir, &lower_id, &identity.version))
    }

    fn read_package(&self, identity: &PackageIdentity) -> Result<Option<Vec<u8>>> {
        match self.find_package(identity) {
            Some(path) => {
                tracing::debug!("Found {} at {}", identity, path.display());
                Ok(Some(fs::read(&path)?))
            }
            None => Ok(None),
        }
    }
}

impl PackageSource for LocalFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        true
    }

    fn dependency_info(
        &self,
        identity: &PackageIdentity,
        framework: &str,
    ) -> Result<Option<DependencyInfo>> {
        let Some(bytes) = self.read_package(identity)? else {
            return Ok(None);
        };

        let nuspec = read_nuspec(&bytes)?;
        Ok(Some(DependencyInfo {
            identity: PackageIdentity::new(nuspec.id.clone(), identity.version.clone()),
            dependencies: nuspec.dependencies_for(framework).to_vec(),
        }))
    }

    fn download(&self, identity: &PackageIdentity) -> Result<Vec<u8>> {
        self.read_package(identity)?.ok_or_else(|| {
            Error::Download(format!("{} not found in {}", identity, self.root.display()))
        })
    }
}

/// The `.nupkg` in `dir` whose name is `<id>.<version>` for a matching version.
fn find_in_dir(dir: &Path, lower_id: &str, version: &PackageVersion) -> Option<PathBuf> {
    let prefix = format!("{}.", lower_id);

    fs::read_dir(dir).ok()?.flatten().map(|e| e.path()).find(|path| {
        if !path.is_file() {
            return false;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_ascii_lowercase()) else {
            return false;
        };
        name.strip_suffix(".nupkg")
            .and_then(|stem| stem.strip_prefix(&prefix))
            .and_then(|v| v.parse::<PackageVersion>().ok())
            .is_some_and(|v| &v == version)
    })
}

/// Read the manifest at the root of a package archive.
pub(crate) fn read_nuspec(bytes: &[u8]) -> Result<Nuspec> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Manifest(format!("invalid package archive: {}", e)))?;

    let name = archive
        .file_names()
        .find(|n| !n.contains('/') && n.to_ascii_lowercase().ends_with(".nuspec"))
        .map(str::to_string)
        .ok_or_else(|| Error::Manifest("package contains no .nuspec".to_string()))?;

    let mut entry = archive
        .by_name(&name)
        .map_err(|e| Error::Manifest(format!("invalid archive entry: {}", e)))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| Error::Manifest(format!("unreadable nuspec: {}", e)))?;

    Nuspec::parse(&xml)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn nupkg(id: &str, version: &str, deps: &str) -> Vec<u8> {
        let nuspec = format!(
            "<package><metadata><id>{id}</id><version>{version}</version>\
             <dependencies><group targetFramework=\".NETStandard2.0\">{deps}</group></dependencies>\
             </metadata></package>"
        );
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(format!("{}.nuspec", id), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(nuspec.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_flat_layout() {
        let temp = tempfile::TempDir::new().unwrap();
        fs::write(
            temp.path().join("Demo.Lib.1.2.0.nupkg"),
            nupkg("Demo.Lib", "1.2.0", r#"<dependency id="Other" version="2.0.0" />"#),
        )
        .unwrap();

        let feed = LocalFeed::new(temp.path());
        let identity = PackageIdentity::new("demo.lib", "1.2".parse().unwrap());
        let info = feed
            .dependency_info(&identity, "netstandard2.1")
            .unwrap()
            .unwrap();

        assert_eq!(info.identity.id, "Demo.Lib");
        assert_eq!(info.dependencies.len(), 1);
        assert_eq!(info.dependencies[0].id, "Other");
        assert!(!feed.download(&identity).unwrap().is_empty());
    }

    #[test]
    fn test_hierarchical_layout() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("demo.lib").join("1.2.0");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("demo.lib.1.2.0.nupkg"), nupkg("Demo.Lib", "1.2.0", "")).unwrap();

        let feed = LocalFeed::new(temp.path());
        let identity = PackageIdentity::new("Demo.Lib", "1.2.0".parse().unwrap());
        assert!(feed.dependency_info(&identity, "netstandard2.1").unwrap().is_some());
    }

    #[test]
    fn test_missing_package() {
        let temp = tempfile::TempDir::new().unwrap();
        fs::write(temp.path().join("demo.lib.1.0.0.nupkg"), nupkg("Demo.Lib", "1.0.0", ""))
            .unwrap();

        let feed = LocalFeed::new(temp.path());
        let identity = PackageIdentity::new("Demo.Lib", "2.0.0".parse().unwrap());
        assert!(feed.dependency_info(&identity, "netstandard2.1").unwrap().is_none());
        assert!(matches!(feed.download(&identity), Err(Error::Download(_))));

        // A longer id sharing the prefix must not match.
        let identity = PackageIdentity::new("Demo", "1.0.0".parse().unwrap());
        assert!(feed.dependency_info(&identity, "netstandard2.1").unwrap().is_none());
    }
}
