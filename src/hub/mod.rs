use crate::credential::HfToken;
use async_trait::async_trait;
use std::path::Path;

pub mod client;
pub mod commit;
pub mod lfs;

pub use client::HubClient;
pub use commit::CommitInfo;
pub use hf_hub::RepoType;

/// The two registry capabilities the uploader relies on.
#[async_trait]
pub trait HubRegistry: Send + Sync {
    /// Create the repository. With `exist_ok`, an existing repository is not an error.
    async fn ensure_repository(
        &self,
        repo_id: &str,
        kind: RepoType,
        exist_ok: bool,
        private: bool,
        token: Option<&HfToken>,
    ) -> crate::Result<()>;

    /// Commit one local file to `path_in_repo`, replacing any file already there.
    async fn upload_file(
        &self,
        local_path: &Path,
        path_in_repo: &str,
        repo_id: &str,
        kind: RepoType,
        token: Option<&HfToken>,
    ) -> crate::Result<CommitInfo>;
}

/// Split `owner/name` into its parts. A bare name has no owner.
pub fn split_repo_id(repo_id: &str) -> (Option<&str>, &str) {
    match repo_id.split_once('/') {
        Some((owner, name)) => (Some(owner), name),
        None => (None, repo_id),
    }
}

/// Value of the `type` field in repo creation requests; models omit it.
pub fn repo_type_field(kind: RepoType) -> Option<&'static str> {
    match kind {
        RepoType::Model => None,
        RepoType::Dataset => Some("dataset"),
        RepoType::Space => Some("space"),
    }
}

/// Path segment used by `/api/<kind>s/...` routes.
pub fn api_segment(kind: RepoType) -> &'static str {
    match kind {
        RepoType::Model => "models",
        RepoType::Dataset => "datasets",
        RepoType::Space => "spaces",
    }
}

/// Prefix in front of the repo id in git and web URLs.
pub fn url_prefix(kind: RepoType) -> &'static str {
    match kind {
        RepoType::Model => "",
        RepoType::Dataset => "datasets/",
        RepoType::Space => "spaces/",
    }
}
