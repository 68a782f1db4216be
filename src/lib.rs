pub mod config;
pub mod credential;
pub mod error;
pub mod hf_loader;
pub mod hub;
pub mod uploader;

pub(crate) use anyhow::{anyhow, bail, Result};

pub use config::PushConfig;
pub use credential::{resolve_token, HfToken};
pub use error::PushError;
pub use hf_loader::HuggingFaceLoader;
pub use hub::{HubClient, HubRegistry};
pub use uploader::{CheckpointUploader, UploadReport};
