//! Fragment discovery and atomic file replacement.
//!
//! Discovery walks a directory tree in file-name order and groups the
//! `.blif` files it finds by their parent directory.  The flattened
//! order of the groups is the discovery order used by every pass, and a
//! fragment's position in it is its index.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::{MergeError, Result};

pub const EXTENSION: &str = "blif";

/// The fragment files of one directory, in discovery order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentGroup {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Name of the i'th shard file in a directory.
pub fn shard_file_name(i: usize) -> String {
    format!("merged{}.{}", i, EXTENSION)
}

/// True for files written by the aggregator on an earlier run.
pub fn is_shard_file(name: &str) -> bool {
    sscanf::sscanf!(name, "merged{usize}.blif").is_ok()
}

pub fn discover(root: &Path) -> Result<Vec<FragmentGroup>> {
    let mut groups: IndexMap<PathBuf, Vec<PathBuf>> = IndexMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory loop"));
            MergeError::io(path, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().map_or(true, |e| e != EXTENSION) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if is_shard_file(&name) {
            continue;
        }
        let dir = path.parent().unwrap_or(root).to_path_buf();
        groups.entry(dir).or_default().push(path.to_path_buf());
    }

    Ok(groups
        .into_iter()
        .map(|(dir, files)| FragmentGroup { dir, files })
        .collect())
}

/// All fragment paths of the groups, in discovery order.
pub fn flatten(groups: &[FragmentGroup]) -> Vec<PathBuf> {
    groups.iter().flat_map(|g| g.files.iter().cloned()).collect()
}

/// Replaces `path` with `text`.  The new contents are staged in a
/// temporary file next to the destination, synced, and renamed over it,
/// so the old contents survive any failure before the rename.  The
/// destination keeps its permissions; a new file gets `NEW_FILE_MODE`.
pub fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MergeError::io(path, e))?;
    tmp.write_all(text.as_bytes())
        .and_then(|_| tmp.flush())
        .map_err(|e| MergeError::io(path, e))?;
    if let Some(perm) = target_permissions(path) {
        tmp.as_file()
            .set_permissions(perm)
            .map_err(|e| MergeError::io(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| MergeError::io(path, e))?;
    tmp.persist(path).map_err(|e| MergeError::io(path, e.error))?;
    Ok(())
}

/// Mode of files written where none existed (temp files start at 0600).
#[cfg(unix)]
pub const NEW_FILE_MODE: u32 = 0o644;

fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(m) => Some(m.permissions()),
        Err(_) => new_file_permissions(),
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(NEW_FILE_MODE))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}
