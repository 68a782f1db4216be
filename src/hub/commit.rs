use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// A file change carried by a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOperation {
    /// Content sent inline with the commit.
    Regular { path_in_repo: String, content: Vec<u8> },
    /// Content already pushed to LFS storage.
    Lfs {
        path_in_repo: String,
        sha256: String,
        size: u64,
    },
}

impl CommitOperation {
    pub fn path_in_repo(&self) -> &str {
        match self {
            CommitOperation::Regular { path_in_repo, .. } => path_in_repo,
            CommitOperation::Lfs { path_in_repo, .. } => path_in_repo,
        }
    }

    fn to_line(&self) -> serde_json::Value {
        match self {
            CommitOperation::Regular {
                path_in_repo,
                content,
            } => json!({
                "key": "file",
                "value": {
                    "content": STANDARD.encode(content),
                    "path": path_in_repo,
                    "encoding": "base64",
                }
            }),
            CommitOperation::Lfs {
                path_in_repo,
                sha256,
                size,
            } => json!({
                "key": "lfsFile",
                "value": {
                    "path": path_in_repo,
                    "algo": "sha256",
                    "oid": sha256,
                    "size": size,
                }
            }),
        }
    }
}

/// Build the newline-delimited JSON body of the commit endpoint.
pub fn commit_payload(summary: &str, operations: &[CommitOperation]) -> crate::Result<String> {
    let header = json!({
        "key": "header",
        "value": { "summary": summary, "description": "" }
    });
    let mut payload = serde_json::to_string(&header)?;
    for operation in operations {
        payload.push('\n');
        payload.push_str(&serde_json::to_string(&operation.to_line())?);
    }
    payload.push('\n');
    Ok(payload)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    #[serde(default)]
    pub commit_url: Option<String>,
    #[serde(default)]
    pub commit_oid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(payload: &str) -> Vec<serde_json::Value> {
        payload
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn regular_file_is_inlined() {
        let payload = commit_payload(
            "Upload config.json",
            &[CommitOperation::Regular {
                path_in_repo: "config.json".to_string(),
                content: b"{}".to_vec(),
            }],
        )
        .unwrap();
        assert!(payload.ends_with('\n'));
        let lines = lines(&payload);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["key"], "header");
        assert_eq!(lines[0]["value"]["summary"], "Upload config.json");
        assert_eq!(lines[1]["key"], "file");
        assert_eq!(lines[1]["value"]["path"], "config.json");
        assert_eq!(lines[1]["value"]["content"], "e30=");
        assert_eq!(lines[1]["value"]["encoding"], "base64");
    }

    #[test]
    fn lfs_file_is_referenced() {
        let payload = commit_payload(
            "Upload model.pt",
            &[CommitOperation::Lfs {
                path_in_repo: "model.pt".to_string(),
                sha256: "deadbeef".to_string(),
                size: 1024,
            }],
        )
        .unwrap();
        let lines = lines(&payload);
        assert_eq!(lines[1]["key"], "lfsFile");
        assert_eq!(lines[1]["value"]["oid"], "deadbeef");
        assert_eq!(lines[1]["value"]["algo"], "sha256");
        assert_eq!(lines[1]["value"]["size"], 1024);
    }

    #[test]
    fn commit_info_reads_camel_case() {
        let info: CommitInfo = serde_json::from_str(
            r#"{"success": true, "commitOid": "abc123", "commitUrl": "https://hub/commit/abc123"}"#,
        )
        .unwrap();
        assert_eq!(info.commit_oid.as_deref(), Some("abc123"));
        assert_eq!(info.commit_url.as_deref(), Some("https://hub/commit/abc123"));
    }
}
