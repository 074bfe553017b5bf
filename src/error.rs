// Error types module
// Fatal conditions that end a browsing session before or during startup

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the browser from running at all
#[derive(Debug, Error)]
pub enum BrowseError {
    /// The directory tree contains no regular files
    #[error("no files found under {}", root.display())]
    EmptyResult { root: PathBuf },

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// No compositor, or a required Wayland global is missing
    #[error("no display available: {0}")]
    NoDisplay(String),
}
