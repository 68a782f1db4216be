use crate::{config::PushConfig, credential::resolve_token, error::PushError};
use hf_hub::{api::tokio::ApiBuilder, Repo, RepoType};
use std::path::PathBuf;

// Downloads land in the hub cache: "$HF_HOME/hub/", or `cache_dir` when configured.

#[derive(Debug, Default)]
pub struct HuggingFaceLoader {
    pub hf_token: Option<String>,
    pub repo_id: Option<String>,
    pub config: PushConfig,
}

impl HuggingFaceLoader {
    pub fn new(hf_token: Option<String>) -> Self {
        Self {
            hf_token,
            repo_id: None,
            config: PushConfig::from_env(),
        }
    }

    pub fn model_from_repo_id(mut self, repo_id: &str) -> Self {
        self.repo_id = Some(repo_id.to_string());
        self
    }

    pub fn config(mut self, config: PushConfig) -> Self {
        self.config = config;
        self
    }

    fn get_hf_token(&self) -> Option<String> {
        resolve_token(self.hf_token.clone()).map(|t| t.expose_secret().to_string())
    }

    fn repo_id(&self) -> crate::Result<&str> {
        match &self.repo_id {
            Some(repo_id) => Ok(repo_id.as_str()),
            None => crate::bail!(PushError::Config("repo_id must be set".to_string())),
        }
    }

    /// Fetch `file_name` from the model repo and return its cached path.
    ///
    /// Always asks the hub, so a file overwritten by a later push replaces
    /// whatever an earlier run left in the cache.
    pub async fn load_file(&self, file_name: &str) -> crate::Result<PathBuf> {
        let repo_id = self.repo_id()?;
        let mut builder = ApiBuilder::from_env()
            .with_progress(true)
            .with_token(self.get_hf_token())
            .with_endpoint(self.config.endpoint_base().to_string());
        if let Some(cache_dir) = &self.config.cache_dir {
            builder = builder.with_cache_dir(cache_dir.to_owned());
        }
        let api = builder.build().map_err(|e| crate::anyhow!(e))?;
        tracing::debug!(repo_id, file_name, "downloading from hub");
        api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            self.config.revision.clone(),
        ))
        .download(file_name)
        .await
        .map_err(|e| crate::anyhow!(e))
    }

    /// Web URL of a file in the model repo.
    pub fn file_url(&self, file_name: &str) -> crate::Result<String> {
        let filename = std::path::Path::new(file_name)
            .file_name()
            .and_then(|os_str| os_str.to_str())
            .unwrap_or(file_name);
        Ok(format!(
            "{}/blob/{}/{}",
            self.config.repo_url(self.repo_id()?),
            self.config.revision,
            filename
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::verify_remote_copy;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RUN_ONE: &[u8] = b"weights from run 1";
    const RUN_TWO: &[u8] = b"weights from run 2";

    // Leave a snapshot behind the way an earlier download would have.
    fn seed_stale_cache(cache_dir: &std::path::Path) {
        let repo_dir = cache_dir.join("models--alice--signdetr");
        std::fs::create_dir_all(repo_dir.join("refs")).unwrap();
        std::fs::write(repo_dir.join("refs/main"), "oldcommit").unwrap();
        let snapshot = repo_dir.join("snapshots/oldcommit");
        std::fs::create_dir_all(&snapshot).unwrap();
        std::fs::write(snapshot.join("model.pt"), RUN_ONE).unwrap();
    }

    async fn hub_serving(contents: &'static [u8]) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(path("/alice/signdetr/resolve/main/model.pt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("etag", "\"newetag\"")
                    .insert_header("x-repo-commit", "newcommit")
                    .insert_header(
                        "content-range",
                        format!("bytes 0-{}/{}", contents.len() - 1, contents.len()).as_str(),
                    )
                    .set_body_bytes(contents),
            )
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn file_url_uses_base_name() {
        let loader = HuggingFaceLoader::new(None)
            .config(PushConfig::default())
            .model_from_repo_id("alice/signdetr");
        assert_eq!(
            loader.file_url("pretrained/4426_model.pt").unwrap(),
            "https://huggingface.co/alice/signdetr/blob/main/4426_model.pt"
        );
    }

    #[tokio::test]
    async fn load_requires_repo_id() {
        let err = HuggingFaceLoader::new(None)
            .load_file("model.pt")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PushError>(),
            Some(PushError::Config(_))
        ));
    }

    #[tokio::test]
    async fn repush_is_fetched_past_a_stale_cache() {
        let cache = tempfile::tempdir().unwrap();
        seed_stale_cache(cache.path());
        let server = hub_serving(RUN_TWO).await;

        let loader = HuggingFaceLoader::new(Some("hf_test".to_string()))
            .config(
                PushConfig::default()
                    .endpoint(&server.uri())
                    .cache_dir(cache.path()),
            )
            .model_from_repo_id("alice/signdetr");
        let remote = loader.load_file("model.pt").await.unwrap();

        assert_eq!(std::fs::read(&remote).unwrap(), RUN_TWO);
        assert!(!server.received_requests().await.unwrap().is_empty());

        let local_dir = tempfile::tempdir().unwrap();
        let local = local_dir.path().join("model.pt");
        std::fs::write(&local, RUN_TWO).unwrap();
        verify_remote_copy("alice/signdetr", &local, &remote)
            .await
            .unwrap();
    }
}
