//! Directory discovery for the image list.
//!
//! Opening a file browses its parent directory; opening a directory
//! browses it directly. Scanning is single-level and skips symlinked
//! directories.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::models::is_image_path;

/// Result of scanning a browse target.
pub struct ScanOutcome {
    /// Image files found, sorted by path.
    pub files: Vec<PathBuf>,
    /// The file the user opened directly, when the target was a file.
    pub target: Option<PathBuf>,
}

/// Discover the image files to browse for `path`.
pub fn discover(path: &Path) -> Result<ScanOutcome> {
    let meta = fs::metadata(path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let (dir, target) = if meta.is_dir() {
        (path.to_path_buf(), None)
    } else {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        (parent, Some(path.to_path_buf()))
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        if is_image_path(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();

    info!(
        dir = %dir.display(),
        count = files.len(),
        "discovered image files"
    );
    Ok(ScanOutcome { files, target })
}
