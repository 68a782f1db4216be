use super::{
    api_segment,
    commit::{commit_payload, CommitInfo, CommitOperation, NDJSON_CONTENT_TYPE},
    lfs::{
        multipart_parts, BatchAction, BatchRequest, BatchResponse, CompleteMultipart,
        CompletedPart, Transfer, UploadInfo, VerifyRequest, LFS_CONTENT_TYPE,
    },
    repo_type_field, split_repo_id, url_prefix, HubRegistry, RepoType,
};
use crate::{config::PushConfig, credential::HfToken, error::PushError};
use async_trait::async_trait;
use reqwest::{header, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::{io::SeekFrom, path::Path};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const USER_AGENT: &str = concat!("hf_push/", env!("CARGO_PKG_VERSION"));

/// Hub REST client.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    config: PushConfig,
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<&'a str>,
    private: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    repo_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct PreuploadRequest<'a> {
    files: Vec<PreuploadFile<'a>>,
}

#[derive(Debug, Serialize)]
struct PreuploadFile<'a> {
    path: &'a str,
    size: u64,
    sample: String,
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadResult {
    path: String,
    upload_mode: UploadMode,
    #[serde(default)]
    should_ignore: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Regular,
    Lfs,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl HubClient {
    pub fn new(config: PushConfig) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(PushError::from)?;
        Ok(Self { http, config })
    }

    fn api_url(&self, kind: RepoType, repo_id: &str, route: &str) -> String {
        let revision: String =
            url::form_urlencoded::byte_serialize(self.config.revision.as_bytes()).collect();
        format!(
            "{}/api/{}/{}/{}/{}",
            self.config.endpoint_base(),
            api_segment(kind),
            repo_id,
            route,
            revision
        )
    }

    fn lfs_batch_url(&self, kind: RepoType, repo_id: &str) -> String {
        format!(
            "{}/{}{}.git/info/lfs/objects/batch",
            self.config.endpoint_base(),
            url_prefix(kind),
            repo_id
        )
    }

    fn authorized(request: RequestBuilder, token: Option<&HfToken>) -> RequestBuilder {
        match token {
            Some(token) => request.header(header::AUTHORIZATION, token.bearer()),
            None => request,
        }
    }

    pub async fn preupload(
        &self,
        repo_id: &str,
        kind: RepoType,
        path_in_repo: &str,
        info: &UploadInfo,
        token: Option<&HfToken>,
    ) -> crate::Result<UploadMode> {
        let url = self.api_url(kind, repo_id, "preupload");
        tracing::debug!(%url, "preupload");
        let body = PreuploadRequest {
            files: vec![PreuploadFile {
                path: path_in_repo,
                size: info.size,
                sample: info.sample_base64(),
            }],
        };
        let response = send(Self::authorized(self.http.post(&url), token).json(&body)).await?;
        let response: PreuploadResponse = response.json().await.map_err(PushError::from)?;
        let result = match response.files.into_iter().find(|f| f.path == path_in_repo) {
            Some(result) => result,
            None => crate::bail!("preupload answer does not mention {}", path_in_repo),
        };
        if result.should_ignore {
            crate::bail!(
                "{} is ignored by the repository's .gitignore",
                path_in_repo
            );
        }
        Ok(result.upload_mode)
    }

    /// Push the file's bytes to LFS storage. Objects the hub already holds are skipped.
    pub async fn upload_lfs(
        &self,
        repo_id: &str,
        kind: RepoType,
        local_path: &Path,
        info: &UploadInfo,
        token: Option<&HfToken>,
    ) -> crate::Result<()> {
        let url = self.lfs_batch_url(kind, repo_id);
        tracing::debug!(%url, oid = %info.sha256, "lfs batch");
        let request = Self::authorized(self.http.post(&url), token)
            .header(header::ACCEPT, LFS_CONTENT_TYPE)
            .header(header::CONTENT_TYPE, LFS_CONTENT_TYPE)
            .body(serde_json::to_vec(&BatchRequest::upload(info, &self.config.revision))?);
        let batch: BatchResponse = send(request).await?.json().await.map_err(PushError::from)?;
        let transfer = batch.transfer()?;

        let object = match batch.objects.into_iter().find(|o| o.oid == info.sha256) {
            Some(object) => object,
            None => crate::bail!("LFS batch answer does not mention {}", info.sha256),
        };
        if let Some(error) = object.error {
            return Err(PushError::Hub {
                status: error.code,
                url,
                message: error.message,
            }
            .into());
        }
        let actions = match object.actions {
            Some(actions) => actions,
            None => {
                tracing::info!(oid = %object.oid, "object already in LFS storage");
                return Ok(());
            }
        };

        if let Some(upload) = &actions.upload {
            match transfer {
                Transfer::Basic => self.put_basic(upload, local_path, info).await?,
                Transfer::Multipart => self.put_multipart(upload, local_path, info).await?,
            }
        }
        if let Some(verify) = &actions.verify {
            self.verify_lfs(verify, info, token).await?;
        }
        Ok(())
    }

    async fn put_basic(
        &self,
        action: &BatchAction,
        local_path: &Path,
        info: &UploadInfo,
    ) -> crate::Result<()> {
        tracing::info!(size = info.size, "uploading to LFS storage");
        let file = tokio::fs::File::open(local_path)
            .await
            .map_err(PushError::from)?;
        let body = reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(file));
        send(
            self.http
                .put(&action.href)
                .header(header::CONTENT_LENGTH, info.size)
                .body(body),
        )
        .await?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        action: &BatchAction,
        local_path: &Path,
        info: &UploadInfo,
    ) -> crate::Result<()> {
        let parts = multipart_parts(action, info.size)?;
        tracing::info!(parts = parts.len(), size = info.size, "multipart LFS upload");
        let mut file = tokio::fs::File::open(local_path)
            .await
            .map_err(PushError::from)?;
        let mut completed = Vec::with_capacity(parts.len());
        for part in parts {
            file.seek(SeekFrom::Start(part.offset))
                .await
                .map_err(PushError::from)?;
            let mut chunk = vec![0u8; part.len as usize];
            file.read_exact(&mut chunk).await.map_err(PushError::from)?;
            tracing::debug!(part = part.number, len = part.len, "uploading part");
            let response = send(self.http.put(&part.url).body(chunk)).await?;
            let etag = match response
                .headers()
                .get(header::ETAG)
                .and_then(|v| v.to_str().ok())
            {
                Some(etag) => etag.to_string(),
                None => crate::bail!("part {} upload returned no ETag", part.number),
            };
            completed.push(CompletedPart {
                part_number: part.number,
                etag,
            });
        }
        let complete = CompleteMultipart {
            oid: &info.sha256,
            parts: completed,
        };
        send(
            self.http
                .post(&action.href)
                .header(header::ACCEPT, LFS_CONTENT_TYPE)
                .header(header::CONTENT_TYPE, LFS_CONTENT_TYPE)
                .body(serde_json::to_vec(&complete)?),
        )
        .await?;
        Ok(())
    }

    async fn verify_lfs(
        &self,
        action: &BatchAction,
        info: &UploadInfo,
        token: Option<&HfToken>,
    ) -> crate::Result<()> {
        let mut request = Self::authorized(self.http.post(&action.href), token)
            .header(header::ACCEPT, LFS_CONTENT_TYPE)
            .header(header::CONTENT_TYPE, LFS_CONTENT_TYPE);
        for (name, value) in &action.header {
            request = request.header(name.as_str(), value.as_str());
        }
        let body = VerifyRequest {
            oid: &info.sha256,
            size: info.size,
        };
        send(request.body(serde_json::to_vec(&body)?)).await?;
        Ok(())
    }

    pub async fn commit(
        &self,
        repo_id: &str,
        kind: RepoType,
        operations: &[CommitOperation],
        token: Option<&HfToken>,
    ) -> crate::Result<CommitInfo> {
        let url = self.api_url(kind, repo_id, "commit");
        let summary = match operations {
            [operation] => self.config.commit_message_for(operation.path_in_repo()),
            _ => self
                .config
                .commit_message
                .clone()
                .unwrap_or_else(|| format!("Upload {} files", operations.len())),
        };
        tracing::debug!(%url, %summary, "commit");
        let request = Self::authorized(self.http.post(&url), token)
            .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(commit_payload(&summary, operations)?);
        let response = send(request).await?;
        let text = response.text().await.map_err(PushError::from)?;
        match serde_json::from_str(&text) {
            Ok(info) => Ok(info),
            Err(e) => {
                tracing::debug!(error = %e, body = %text, "unreadable commit response");
                Ok(CommitInfo::default())
            }
        }
    }
}

#[async_trait]
impl HubRegistry for HubClient {
    async fn ensure_repository(
        &self,
        repo_id: &str,
        kind: RepoType,
        exist_ok: bool,
        private: bool,
        token: Option<&HfToken>,
    ) -> crate::Result<()> {
        let (organization, name) = split_repo_id(repo_id);
        let url = format!("{}/api/repos/create", self.config.endpoint_base());
        tracing::debug!(%url, repo_id, private, "create repo");
        let body = CreateRepoRequest {
            name,
            organization,
            private,
            repo_type: repo_type_field(kind),
        };
        let response = Self::authorized(self.http.post(&url), token)
            .json(&body)
            .send()
            .await
            .map_err(PushError::from)?;
        if exist_ok && response.status() == StatusCode::CONFLICT {
            tracing::info!(repo_id, "repository already exists");
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        path_in_repo: &str,
        repo_id: &str,
        kind: RepoType,
        token: Option<&HfToken>,
    ) -> crate::Result<CommitInfo> {
        let info = UploadInfo::from_path(local_path).await?;
        let mode = self
            .preupload(repo_id, kind, path_in_repo, &info, token)
            .await?;
        tracing::info!(path_in_repo, ?mode, size = info.size, "upload mode");
        let operation = match mode {
            UploadMode::Regular => CommitOperation::Regular {
                path_in_repo: path_in_repo.to_string(),
                content: tokio::fs::read(local_path).await.map_err(PushError::from)?,
            },
            UploadMode::Lfs => {
                self.upload_lfs(repo_id, kind, local_path, &info, token)
                    .await?;
                CommitOperation::Lfs {
                    path_in_repo: path_in_repo.to_string(),
                    sha256: info.sha256.clone(),
                    size: info.size,
                }
            }
        };
        self.commit(repo_id, kind, &[operation], token).await
    }
}

async fn send(request: RequestBuilder) -> crate::Result<Response> {
    let response = request.send().await.map_err(PushError::from)?;
    check(response).await
}

/// Turn a non-success answer into `PushError::Hub`.
async fn check(response: Response) -> crate::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(PushError::Hub {
        status: status.as_u16(),
        url,
        message: error_message(&body),
    }
    .into())
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(error) => error.error,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
