//! Error kinds for the merge pipeline.  Every variant carries the path of
//! the fragment (or directory, or tool) that caused it, so a diagnostic
//! always names the offending file.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MergeError>;

#[derive(Error, Debug)]
pub enum MergeError {
    /// Missing declaration block, missing defined-signal token, or no
    /// statement marker.
    #[error("malformed fragment {}: {reason}", .path.display())]
    MalformedFragment { path: PathBuf, reason: String },

    /// A defined name is still shared by two fragments after resolution.
    #[error(
        "signal `{name}` is defined in both {} and {} after collision resolution",
        .first.display(),
        .second.display()
    )]
    NameCollisionUnresolved {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("partitioner failure ({}): {reason}", .path.display())]
    ExternalToolFailure { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MergeError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> MergeError {
        MergeError::MalformedFragment {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> MergeError {
        MergeError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn tool(path: impl Into<PathBuf>, reason: impl Into<String>) -> MergeError {
        MergeError::ExternalToolFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
