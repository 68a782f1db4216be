//! Git LFS batch types and file fingerprinting.
//!
//! Large or binary files are not inlined in a commit. The hub hands out
//! storage URLs through the LFS batch API, the bytes go there, and the
//! commit only references the object by its sha256.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, path::Path};
use tokio::io::AsyncReadExt;

pub const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";
pub const SAMPLE_SIZE: usize = 512;
const HASH_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Size, hash and leading bytes of a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub size: u64,
    pub sha256: String,
    pub sample: Vec<u8>,
}

impl UploadInfo {
    pub async fn from_path(path: &Path) -> crate::Result<Self> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut sample = Vec::with_capacity(SAMPLE_SIZE);
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
        let mut size = 0u64;
        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            if sample.len() < SAMPLE_SIZE {
                let take = (SAMPLE_SIZE - sample.len()).min(read);
                sample.extend_from_slice(&buffer[..take]);
            }
            hasher.update(&buffer[..read]);
            size += read as u64;
        }
        Ok(Self {
            size,
            sha256: hex::encode(hasher.finalize()),
            sample,
        })
    }

    pub fn sample_base64(&self) -> String {
        STANDARD.encode(&self.sample)
    }
}

pub async fn sha256_file(path: &Path) -> crate::Result<String> {
    Ok(UploadInfo::from_path(path).await?.sha256)
}

#[derive(Debug, Serialize)]
pub struct BatchRequest<'a> {
    pub operation: &'static str,
    pub transfers: Vec<&'static str>,
    pub objects: Vec<BatchObjectRef<'a>>,
    pub hash_algo: &'static str,
    #[serde(rename = "ref")]
    pub git_ref: GitRef<'a>,
}

#[derive(Debug, Serialize)]
pub struct GitRef<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct BatchObjectRef<'a> {
    pub oid: &'a str,
    pub size: u64,
}

impl<'a> BatchRequest<'a> {
    pub fn upload(info: &'a UploadInfo, revision: &'a str) -> Self {
        Self {
            operation: "upload",
            transfers: vec!["basic", "multipart"],
            objects: vec![BatchObjectRef {
                oid: &info.sha256,
                size: info.size,
            }],
            hash_algo: "sha256",
            git_ref: GitRef { name: revision },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub transfer: Option<String>,
    pub objects: Vec<BatchObject>,
}

#[derive(Debug, Deserialize)]
pub struct BatchObject {
    pub oid: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub actions: Option<BatchActions>,
    #[serde(default)]
    pub error: Option<BatchObjectError>,
}

#[derive(Debug, Deserialize)]
pub struct BatchActions {
    #[serde(default)]
    pub upload: Option<BatchAction>,
    #[serde(default)]
    pub verify: Option<BatchAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchAction {
    pub href: String,
    #[serde(default)]
    pub header: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchObjectError {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Basic,
    Multipart,
}

impl BatchResponse {
    pub fn transfer(&self) -> crate::Result<Transfer> {
        match self.transfer.as_deref() {
            None | Some("basic") => Ok(Transfer::Basic),
            Some("multipart") => Ok(Transfer::Multipart),
            Some(other) => crate::bail!("unsupported LFS transfer: {}", other),
        }
    }
}

/// One slice of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub number: u32,
    pub url: String,
    pub offset: u64,
    pub len: u64,
}

/// Lay out the parts described by a multipart upload action.
///
/// The action header holds `chunk_size` plus one presigned URL per part,
/// keyed by the 1-based part number.
pub fn multipart_parts(action: &BatchAction, file_size: u64) -> crate::Result<Vec<Part>> {
    let chunk_size: u64 = match action.header.get("chunk_size") {
        Some(value) => value
            .parse()
            .map_err(|_| crate::anyhow!("invalid chunk_size in LFS action: {}", value))?,
        None => crate::bail!("multipart LFS action has no chunk_size"),
    };
    if chunk_size == 0 {
        crate::bail!("multipart LFS action has a zero chunk_size");
    }

    let mut numbered: Vec<(u32, &String)> = action
        .header
        .iter()
        .filter_map(|(key, url)| key.parse::<u32>().ok().map(|n| (n, url)))
        .collect();
    numbered.sort_by_key(|(n, _)| *n);

    let expected = file_size.div_ceil(chunk_size);
    if numbered.len() as u64 != expected {
        crate::bail!(
            "LFS action lists {} parts but a {} byte file needs {}",
            numbered.len(),
            file_size,
            expected
        );
    }

    numbered
        .into_iter()
        .enumerate()
        .map(|(i, (number, url))| {
            if number as usize != i + 1 {
                crate::bail!("LFS multipart part {} is missing", i + 1);
            }
            let offset = i as u64 * chunk_size;
            Ok(Part {
                number,
                url: url.to_owned(),
                offset,
                len: chunk_size.min(file_size - offset),
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct CompletedPart {
    #[serde(rename = "partNumber")]
    pub part_number: u32,
    pub etag: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteMultipart<'a> {
    pub oid: &'a str,
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Serialize)]
pub struct VerifyRequest<'a> {
    pub oid: &'a str,
    pub size: u64,
}
