//! Filesystem helpers for build output.
//!
//! Everything the router may read while a build runs goes through
//! [`write_atomic`], so readers see either the old file or the new one.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use jwalk::WalkDir;
use tempfile::NamedTempFile;

/// Write `contents` to `path` through a temp file in the same directory + rename.
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_ref())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Remove `dir` (if present) and recreate it empty.
pub fn recreate_dir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(dir)
}

/// Outcome of [`copy_dir_files`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Files copied.
    pub copied: usize,
    /// Destinations that already existed and were left untouched.
    pub skipped: Vec<PathBuf>,
}

/// Copy every file under `src` into `dest`, preserving relative paths.
///
/// Existing destination files are never overwritten; they are reported in
/// [`CopyReport::skipped`].
pub fn copy_dir_files(src: &Path, dest: &Path) -> io::Result<CopyReport> {
    let mut report = CopyReport::default();

    for entry in WalkDir::new(src).sort(true).skip_hidden(false) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(src) else {
            continue;
        };

        let target = dest.join(relative);
        if target.exists() {
            report.skipped.push(target);
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&path, &target)?;
        report.copied += 1;
    }

    Ok(report)
}
