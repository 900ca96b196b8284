//! Filesystem helpers shared by the backends and the archive builder. All of these block and are
//! meant to be called from `spawn_blocking` or from tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Recursively copy `src` on top of `dst`, overwriting files that already exist. Returns the
/// copied files, relative to `dst`, in sorted order.
pub(crate) fn copy_dir(src: &Path, dst: &Path) -> io::Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?
            .to_path_buf();
        let target = dst.join(&relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if target.is_dir() {
                fs::remove_dir_all(&target)?;
            }
            fs::copy(entry.path(), &target)?;
            copied.push(relative);
        }
    }
    Ok(copied)
}

/// All regular files below `root`, relative to it, in sorted order.
pub(crate) fn list_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.is_dir() {
        return Ok(files);
    }
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_dir() {
            files.push(
                entry
                    .path()
                    .strip_prefix(root)
                    .map_err(io::Error::other)?
                    .to_path_buf(),
            );
        }
    }
    Ok(files)
}

/// Byte-for-byte comparison of two files.
pub(crate) fn same_contents(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}
