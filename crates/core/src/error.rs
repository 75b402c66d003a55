//! Error types for the deploy engine

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a server operation, rendered as a single line naming the
/// operation and the path it touched.
#[derive(Debug, Error)]
#[error("{op} {path}: {message}")]
pub struct ServerError {
    op: &'static str,
    path: String,
    message: String,
}

impl ServerError {
    #[must_use]
    pub fn new(
        op: &'static str,
        path: impl std::fmt::Display,
        message: impl std::fmt::Display,
    ) -> Self {
        Self {
            op,
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

/// Remote manifest could not be decoded. Recovered by treating the remote
/// state as empty, so it is never fatal on its own.
#[derive(Debug, Error)]
#[error("manifest decode failed: {0}")]
pub struct ManifestError(#[from] pub(crate) std::io::Error);

/// Top-level deploy failure.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Invalid configuration, raised before any remote contact
    #[error("config: {0}")]
    Config(String),

    /// Server failure in a phase where it is fatal
    #[error(transparent)]
    Server(#[from] ServerError),

    /// A pre- or post-deploy job reported failure
    #[error("job `{job}` failed: {reason}")]
    Job { job: String, reason: String },

    /// Local filesystem failure
    #[error("{}: {source}", path.display())]
    Local {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl DeployError {
    #[must_use]
    pub fn local(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Local {
            path: path.into(),
            source,
        }
    }
}

impl From<globset::Error> for DeployError {
    fn from(err: globset::Error) -> Self {
        Self::Config(err.to_string())
    }
}
