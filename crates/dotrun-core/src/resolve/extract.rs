//! `.nupkg` extraction into the package cache.

use std::fs;
use std::borrow::Cow;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Marker written once a package directory is fully extracted.
pub const COMPLETE_MARKER: &str = ".dotrun.complete";

/// Packaging metadata that is never extracted.
fn is_packaging_entry(name: &str) -> bool {
    name == "[Content_Types].xml"
        || name.starts_with("_rels/")
        || name.starts_with("package/services/metadata/")
        || name.ends_with(".psmdcp")
}

/// Extract a package archive into `dest`.
///
/// Each file is written under a temporary name and renamed into place, so a
/// concurrent reader sees either the old file or the complete new one.
/// Existing files are overwritten.
pub fn extract_package(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Download(format!("invalid package archive: {}", e)))?;

    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::Download(format!("invalid archive entry: {}", e)))?;

        let name = percent_decode(entry.name());
        if entry.is_dir() || is_packaging_entry(&name) {
            continue;
        }

        let rel = sanitize_entry_path(&name)?;
        let out_path = dest.join(rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut content = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::Download(format!("failed to read {}: {}", name, e)))?;

        write_atomic(&out_path, &content)?;
    }

    fs::write(dest.join(COMPLETE_MARKER), b"")?;
    Ok(())
}

/// Whether `dir` holds a completed extraction.
pub fn is_extracted(dir: &Path) -> bool {
    dir.join(COMPLETE_MARKER).is_file()
}

/// Write through a temporary sibling, then rename over the target.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Reject entry names that would escape the destination.
fn sanitize_entry_path(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if name.is_empty() {
        return Err(Error::Download("empty archive path".to_string()));
    }

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(Error::Download(format!(
                    "absolute archive paths are not allowed: {:?}",
                    name
                )));
            }
            Component::ParentDir => {
                return Err(Error::Download(format!(
                    "archive paths must not contain '..': {:?}",
                    name
                )));
            }
            Component::CurDir => {}
            Component::Normal(part) => out.push(part),
        }
    }

    if out.as_os_str().is_empty() {
        return Err(Error::Download(format!("empty archive path: {:?}", name)));
    }
    Ok(out)
}

/// Packages store entry names URI-escaped (`%2B` for `+`).
fn percent_decode(name: &str) -> String {
    urlencoding::decode(name)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| name.to_string())
}
