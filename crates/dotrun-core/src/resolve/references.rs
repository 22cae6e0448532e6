//! Reference assembly sets.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use super::framework::normalize_framework;

/// Ordered, duplicate-free set of assembly paths handed to the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    paths: Vec<PathBuf>,
    seen: FxHashSet<PathBuf>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path; returns `false` if it was already present.
    pub fn push(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.seen.contains(&path) {
            return false;
        }
        self.seen.insert(path.clone());
        self.paths.push(path);
        true
    }

    pub fn extend<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self.push(path);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn into_vec(self) -> Vec<PathBuf> {
        self.paths
    }
}

impl FromIterator<PathBuf> for ReferenceSet {
    fn from_iter<T: IntoIterator<Item = PathBuf>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// Assemblies an extracted package contributes.
///
/// Probes `lib/<framework>` for each framework in order; the first directory
/// that exists wins and its `*.dll` files are returned sorted by name. No
/// match yields nothing.
pub fn package_assemblies(package_dir: &Path, framework_order: &[String]) -> Vec<PathBuf> {
    let lib = package_dir.join("lib");
    let Ok(entries) = fs::read_dir(&lib) else {
        return Vec::new();
    };

    let framework_dirs: Vec<(String, PathBuf)> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter_map(|p| {
            let name = normalize_framework(&p.file_name()?.to_string_lossy());
            Some((name, p))
        })
        .collect();

    for framework in framework_order {
        let framework = normalize_framework(framework);
        let Some((_, dir)) = framework_dirs.iter().find(|(name, _)| *name == framework) else {
            continue;
        };

        tracing::debug!("Using {} assets from {}", framework, dir.display());
        let mut dlls: Vec<PathBuf> = fs::read_dir(dir)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| {
                        p.is_file()
                            && p.extension()
                                .is_some_and(|ext| ext.eq_ignore_ascii_case("dll"))
                    })
                    .collect()
            })
            .unwrap_or_default();
        dlls.sort();
        return dlls;
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Vec<String> {
        super::super::framework::DEFAULT_FRAMEWORK_ORDER
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_reference_set_dedupes_in_order() {
        let mut set = ReferenceSet::new();
        assert!(set.push("/a/B.dll"));
        assert!(set.push("/a/A.dll"));
        assert!(!set.push("/a/B.dll"));

        let paths: Vec<_> = set.iter().collect();
        assert_eq!(paths, vec![Path::new("/a/B.dll"), Path::new("/a/A.dll")]);
    }

    #[test]
    fn test_first_existing_framework_wins() {
        let temp = tempfile::TempDir::new().unwrap();
        for (dir, file) in [
            ("lib/netstandard2.0", "Std20.dll"),
            ("lib/net6.0", "Net6.dll"),
            ("lib/net45", "Legacy.dll"),
        ] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
            fs::write(temp.path().join(dir).join(file), b"MZ").unwrap();
        }
        fs::write(temp.path().join("lib/netstandard2.0/readme.xml"), "").unwrap();

        let dlls = package_assemblies(temp.path(), &order());
        assert_eq!(dlls, vec![temp.path().join("lib/netstandard2.0/Std20.dll")]);
    }

    #[test]
    fn test_dlls_sorted() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("lib/netstandard2.1");
        fs::create_dir_all(&dir).unwrap();
        for name in ["Zeta.dll", "Alpha.DLL", "Mid.dll"] {
            fs::write(dir.join(name), b"MZ").unwrap();
        }

        let names: Vec<String> = package_assemblies(temp.path(), &order())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Alpha.DLL", "Mid.dll", "Zeta.dll"]);
    }

    #[test]
    fn test_no_matching_framework() {
        let temp = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("lib/net45")).unwrap();
        assert!(package_assemblies(temp.path(), &order()).is_empty());
        assert!(package_assemblies(&temp.path().join("missing"), &order()).is_empty());
    }
}
