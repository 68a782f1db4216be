use crate::error::PushError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_REVISION: &str = "main";
pub const DEFAULT_CHECKPOINT: &str = "pretrained/4426_model.pt";
pub const HF_ENDPOINT_ENV: &str = "HF_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConfig {
    pub endpoint: String,
    pub revision: String,
    pub private: bool,
    pub commit_message: Option<String>,
    pub checkpoint: PathBuf,
    pub repo_id: Option<String>,
    /// Where `--verify` downloads land. Unset means the hub cache under `HF_HOME`.
    pub cache_dir: Option<PathBuf>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            revision: DEFAULT_REVISION.to_string(),
            private: false,
            commit_message: None,
            checkpoint: PathBuf::from(DEFAULT_CHECKPOINT),
            repo_id: None,
            cache_dir: None,
        }
    }
}

// Every key is optional so a file only overrides what it names.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    endpoint: Option<String>,
    revision: Option<String>,
    private: Option<bool>,
    commit_message: Option<String>,
    checkpoint: Option<PathBuf>,
    repo_id: Option<String>,
    cache_dir: Option<PathBuf>,
}

impl PushConfig {
    /// Defaults with `HF_ENDPOINT` applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var(HF_ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                config.endpoint = endpoint.trim().to_string();
            }
        }
        config
    }

    pub fn from_toml_str(self, toml_str: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(toml_str).map_err(|e| PushError::Config(e.to_string()))?;
        self.merge(file).validated()
    }

    /// Overlay a TOML file onto this config.
    pub fn from_toml_file(self, path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PushError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        self.from_toml_str(&contents)
    }

    fn merge(mut self, file: ConfigFile) -> Self {
        if let Some(endpoint) = file.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(revision) = file.revision {
            self.revision = revision;
        }
        if let Some(private) = file.private {
            self.private = private;
        }
        if file.commit_message.is_some() {
            self.commit_message = file.commit_message;
        }
        if let Some(checkpoint) = file.checkpoint {
            self.checkpoint = checkpoint;
        }
        if file.repo_id.is_some() {
            self.repo_id = file.repo_id;
        }
        if file.cache_dir.is_some() {
            self.cache_dir = file.cache_dir;
        }
        self
    }

    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn revision(mut self, revision: &str) -> Self {
        self.revision = revision.to_string();
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    pub fn commit_message(mut self, message: &str) -> Self {
        self.commit_message = Some(message.to_string());
        self
    }

    pub fn checkpoint(mut self, checkpoint: impl Into<PathBuf>) -> Self {
        self.checkpoint = checkpoint.into();
        self
    }

    pub fn repo_id(mut self, repo_id: &str) -> Self {
        self.repo_id = Some(repo_id.to_string());
        self
    }

    pub fn cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    pub fn validated(self) -> crate::Result<Self> {
        let url = url::Url::parse(&self.endpoint)
            .map_err(|e| PushError::Config(format!("endpoint {:?}: {}", self.endpoint, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            crate::bail!(PushError::Config(format!(
                "endpoint must be http or https, got {}",
                self.endpoint
            )));
        }
        if self.revision.trim().is_empty() {
            crate::bail!(PushError::Config("revision must not be empty".to_string()));
        }
        Ok(self)
    }

    pub fn endpoint_base(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// Public page of a repository on this endpoint.
    pub fn repo_url(&self, repo_id: &str) -> String {
        format!("{}/{}", self.endpoint_base(), repo_id.trim_matches('/'))
    }

    pub fn commit_message_for(&self, path_in_repo: &str) -> String {
        match &self.commit_message {
            Some(message) => message.to_owned(),
            None => format!("Upload {}", path_in_repo),
        }
    }
}
