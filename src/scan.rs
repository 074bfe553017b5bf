// File enumeration module
// Depth-first walk of the root directory producing browse candidates

use crate::error::BrowseError;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collect every regular file below `root`, depth-first.
///
/// Entries of each directory are visited in file-name order and a
/// subdirectory is descended into as soon as it is reached, so the result
/// is reproducible for a fixed filesystem state. Directories are never
/// part of the output. Symbolic links are followed; entries that cannot be
/// read, link loops included, are logged and skipped.
pub fn scan(root: &Path) -> Result<Vec<PathBuf>, BrowseError> {
    if !root.is_dir() {
        return Err(BrowseError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            // The root itself failing is fatal, anything deeper is skipped
            Err(e) if e.depth() == 0 => return Err(BrowseError::Walk(e)),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(BrowseError::EmptyResult {
            root: root.to_path_buf(),
        });
    }

    debug!("Scanned {} files under {}", files.len(), root.display());
    Ok(files)
}

/// Render the candidate list the way listing mode prints it
pub fn format_listing(files: &[PathBuf]) -> String {
    files
        .iter()
        .enumerate()
        .map(|(i, path)| format!("{:>3}. {}\n", i, path.display()))
        .collect()
}
