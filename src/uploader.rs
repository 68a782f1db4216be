use crate::{
    config::PushConfig,
    credential::HfToken,
    error::PushError,
    hub::{lfs::sha256_file, CommitInfo, HubRegistry, RepoType},
};
use std::{
    fmt,
    io::Write,
    path::{Path, PathBuf},
};

/// Outcome of a successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub repo_id: String,
    pub path_in_repo: String,
    pub repo_url: String,
    pub commit: CommitInfo,
}

impl UploadReport {
    /// How downstream code fetches the uploaded file.
    pub fn usage_hint(&self) -> String {
        format!(
            "HuggingFaceLoader::new(None).model_from_repo_id(\"{}\").load_file(\"{}\")",
            self.repo_id, self.path_in_repo
        )
    }
}

impl fmt::Display for UploadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model uploaded successfully!")?;
        writeln!(f, "View at: {}", self.repo_url)?;
        writeln!(f)?;
        writeln!(f, "Update your code to use:")?;
        writeln!(f, "   {}", self.usage_hint())
    }
}

/// File name the checkpoint gets inside the repository.
pub fn destination_name(checkpoint: &Path) -> crate::Result<String> {
    match checkpoint.file_name() {
        Some(name) => Ok(name.to_string_lossy().to_string()),
        None => Err(PushError::FileNotFound {
            path: checkpoint.to_path_buf(),
        }
        .into()),
    }
}

pub struct CheckpointUploader<R, W = std::io::Stdout> {
    registry: R,
    config: PushConfig,
    out: W,
}

impl<R: HubRegistry> CheckpointUploader<R> {
    pub fn new(registry: R, config: PushConfig) -> Self {
        Self {
            registry,
            config,
            out: std::io::stdout(),
        }
    }
}

impl<R: HubRegistry, W: Write> CheckpointUploader<R, W> {
    /// Send status messages somewhere other than stdout.
    pub fn with_output<O: Write>(self, out: O) -> CheckpointUploader<R, O> {
        CheckpointUploader {
            registry: self.registry,
            config: self.config,
            out,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Push `checkpoint` to `repo_id`.
    ///
    /// A missing checkpoint fails before any request is made. Failing to
    /// create the repository is reported and the upload is attempted anyway.
    /// A failed upload is returned as `PushError::UploadFailed`.
    pub async fn upload(
        &mut self,
        checkpoint: &Path,
        repo_id: &str,
        token: Option<&HfToken>,
    ) -> crate::Result<UploadReport> {
        let checkpoint = existing_file(checkpoint).await?;
        let path_in_repo = destination_name(&checkpoint)?;
        let repo_url = self.config.repo_url(repo_id);

        writeln!(self.out, "Uploading {} to {}...", checkpoint.display(), repo_id)
            .map_err(PushError::from)?;
        tracing::info!(checkpoint = %checkpoint.display(), repo_id, "pushing checkpoint");

        match self
            .registry
            .ensure_repository(repo_id, RepoType::Model, true, self.config.private, token)
            .await
        {
            Ok(()) => {
                writeln!(self.out, "Repository created/verified: {}", repo_url)
                    .map_err(PushError::from)?;
            }
            Err(e) => {
                let err = PushError::RepoEnsureFailed {
                    repo_id: repo_id.to_string(),
                    reason: format!("{:#}", e),
                };
                tracing::warn!(error = %err, "repository ensure failed, continuing");
                writeln!(self.out, "{}", err).map_err(PushError::from)?;
                writeln!(self.out, "Attempting upload anyway...").map_err(PushError::from)?;
            }
        }

        let commit = self
            .registry
            .upload_file(&checkpoint, &path_in_repo, repo_id, RepoType::Model, token)
            .await
            .map_err(|e| PushError::UploadFailed {
                repo_id: repo_id.to_string(),
                path_in_repo: path_in_repo.clone(),
                reason: format!("{:#}", e),
            })?;
        tracing::info!(repo_id, %path_in_repo, commit = ?commit.commit_oid, "upload committed");

        let report = UploadReport {
            repo_id: repo_id.to_string(),
            path_in_repo,
            repo_url,
            commit,
        };
        write!(self.out, "{}", report).map_err(PushError::from)?;
        self.out.flush().map_err(PushError::from)?;
        Ok(report)
    }
}

async fn existing_file(checkpoint: &Path) -> crate::Result<PathBuf> {
    match tokio::fs::metadata(checkpoint).await {
        Ok(meta) if meta.is_file() => Ok(checkpoint.to_path_buf()),
        _ => Err(PushError::FileNotFound {
            path: checkpoint.to_path_buf(),
        }
        .into()),
    }
}

/// Compare a downloaded copy against the local checkpoint.
///
/// A mismatch means the hub does not hold what was pushed, reported as
/// `PushError::UploadFailed`.
pub async fn verify_remote_copy(
    repo_id: &str,
    local: &Path,
    remote: &Path,
) -> crate::Result<()> {
    let local_sha = sha256_file(local).await?;
    let remote_sha = sha256_file(remote).await?;
    if local_sha != remote_sha {
        return Err(PushError::UploadFailed {
            repo_id: repo_id.to_string(),
            path_in_repo: destination_name(local)?,
            reason: format!(
                "remote copy does not match: local sha256 {}, remote sha256 {}",
                local_sha, remote_sha
            ),
        }
        .into());
    }
    tracing::info!(sha256 = %local_sha, "remote copy matches local checkpoint");
    Ok(())
}
