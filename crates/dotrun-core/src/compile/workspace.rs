//! Ephemeral build workspaces.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// A uniquely named scratch directory, removed when dropped.
#[derive(Debug)]
pub struct EphemeralWorkspace {
    dir: TempDir,
}

impl EphemeralWorkspace {
    /// Create a workspace under `parent` (the system temp dir if `None`).
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("dotrun-");
        let dir = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        tracing::debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the workspace root.
    pub fn write(
        &self,
        relative: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
    ) -> Result<PathBuf> {
        let target = self.path().join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, contents)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let parent = tempfile::TempDir::new().unwrap();
        let path = {
            let workspace = EphemeralWorkspace::create(Some(parent.path())).unwrap();
            workspace.write("src/Program.cs", "class A {}").unwrap();
            assert!(workspace.path().join("src/Program.cs").is_file());
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_unique_names() {
        let parent = tempfile::TempDir::new().unwrap();
        let a = EphemeralWorkspace::create(Some(parent.path())).unwrap();
        let b = EphemeralWorkspace::create(Some(parent.path())).unwrap();
        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("dotrun-"));
    }

    #[test]
    fn test_creates_missing_parent() {
        let temp = tempfile::TempDir::new().unwrap();
        let parent = temp.path().join("nested/work");
        let workspace = EphemeralWorkspace::create(Some(&parent)).unwrap();
        assert!(workspace.path().starts_with(&parent));
    }

    #[test]
    fn test_removed_on_error_path() {
        fn failing(parent: &Path) -> Result<PathBuf> {
            let workspace = EphemeralWorkspace::create(Some(parent))?;
            let path = workspace.path().to_path_buf();
            let _ = workspace.write("a.txt", "x")?;
            Err(crate::error::Error::Compilation {
                message: format!("failed in {}", path.display()),
                diagnostics: Vec::new(),
            })
        }

        let parent = tempfile::TempDir::new().unwrap();
        assert!(failing(parent.path()).is_err());
        assert_eq!(fs::read_dir(parent.path()).unwrap().count(), 0);
    }
}
