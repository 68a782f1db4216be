use std::path::PathBuf;

/// Failures raised while pushing a checkpoint.
///
/// Library functions return `crate::Result`, so these arrive wrapped in an
/// `anyhow::Error`. Use `err.downcast_ref::<PushError>()` to classify them.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Checkpoint not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Could not create repo: {reason}")]
    RepoEnsureFailed { repo_id: String, reason: String },

    #[error("Failed to upload {path_in_repo} to {repo_id}: {reason}")]
    UploadFailed {
        repo_id: String,
        path_in_repo: String,
        reason: String,
    },

    #[error("Hub returned {status} for {url}: {message}")]
    Hub {
        status: u16,
        url: String,
        message: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(String),
}

impl PushError {
    pub fn is_file_not_found(&self) -> bool {
        matches!(self, PushError::FileNotFound { .. })
    }

    pub fn is_upload_failed(&self) -> bool {
        matches!(self, PushError::UploadFailed { .. })
    }

    /// Status code of a registry rejection, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            PushError::Hub { status, .. } => Some(*status),
            _ => None,
        }
    }
}
