//! Source tree scanning.
//!
//! Recursively walks a directory and produces the list of regular files to
//! archive, with relative paths normalized to forward slashes.

use std::path::{Path, PathBuf};

use crate::error::ArchiveError;

/// A file selected for archiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the scan root, `/`-separated.
    pub relative_path: String,
    /// Canonical absolute path used to open the file.
    pub path: PathBuf,
    /// Size in bytes at scan time.
    pub size: u64,
}

/// Scans `root` recursively and returns its regular files.
///
/// Symbolic links are not followed. Entries are sorted by relative path so
/// runs are reproducible.
pub fn scan_tree(root: &Path) -> Result<Vec<FileEntry>, ArchiveError> {
    scan_tree_excluding(root, &[])
}

/// Like [`scan_tree`], but skips everything under any of `exclude`.
///
/// The root and the exclusions are canonicalized first, so relative and
/// absolute spellings of the same directory compare equal. Exclusions that
/// do not exist yet are ignored.
pub fn scan_tree_excluding(
    root: &Path,
    exclude: &[PathBuf],
) -> Result<Vec<FileEntry>, ArchiveError> {
    let root = std::fs::canonicalize(root)?;
    let exclude: Vec<PathBuf> = exclude
        .iter()
        .filter_map(|p| std::fs::canonicalize(p).ok())
        .collect();

    let mut files = Vec::new();
    walk_dir(&root, &root, &exclude, &mut files)?;
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    exclude: &[PathBuf],
    files: &mut Vec<FileEntry>,
) -> Result<(), ArchiveError> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if exclude.iter().any(|x| path.starts_with(x)) {
            continue;
        }
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &path, exclude, files)?;
        } else if file_type.is_file() {
            let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;
            let relative_path = rel_path.to_string_lossy().replace('\\', "/");
            let size = entry.metadata()?.len();

            files.push(FileEntry {
                relative_path,
                path,
                size,
            });
        }
    }

    Ok(())
}

/// Sum of all entry sizes.
pub fn total_size(files: &[FileEntry]) -> u64 {
    files.iter().map(|f| f.size).sum()
}
