//! Hugging Face Hub dataset repository: publish the stored table and fetch
//! the published copy.
//!
//! An upload asks the Hub how each file should be committed. Small files go
//! inline in the commit body; large ones are pushed to LFS storage first and
//! the commit only references them by digest and size.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::{Body, Client};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{Config, HUB_TOKEN_ENV};
use crate::error::{Error, Result};
use crate::store::{read_table, TableLoader};
use crate::types::IncidentRecord;

/// Leading bytes the Hub inspects to pick an upload mode
const SAMPLE_BYTES: usize = 512;

const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// Publishes a local file to a remote location
pub trait BlobUploader {
    fn upload_file(&self, local: &Path, path_in_repo: &str) -> Result<()>;
}

/// Blocking HTTP client without the default request timeout; table
/// downloads and LFS uploads can run for minutes
pub(crate) fn blocking_client() -> Client {
    let builder = Client::builder().timeout(None::<Duration>);
    #[cfg(test)]
    let builder = builder.no_proxy();
    builder.build().unwrap_or_else(|_| Client::new())
}

/// Size, SHA-256 and first bytes of a local file, read in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u64,
    pub sha256: String,
    pub sample: Vec<u8>,
}

impl FileInfo {
    pub fn read(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut sample = Vec::with_capacity(SAMPLE_BYTES);
        let mut size = 0u64;
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            if sample.len() < SAMPLE_BYTES {
                let take = (SAMPLE_BYTES - sample.len()).min(n);
                sample.extend_from_slice(&buf[..take]);
            }
            hasher.update(&buf[..n]);
            size += n as u64;
        }

        Ok(Self {
            size,
            sha256: format!("{:x}", hasher.finalize()),
            sample,
        })
    }
}

/// How the Hub wants a file committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Regular,
    Lfs,
}

/// The file line of a commit
#[derive(Debug, Clone, Copy)]
pub enum CommitFile<'a> {
    /// Contents carried base64-encoded in the commit itself
    Inline(&'a [u8]),
    /// Contents already in LFS storage, referenced by digest
    Lfs(&'a FileInfo),
}

/// NDJSON body for the Hub commit API: a header line, then one file line
pub fn build_commit_payload(path_in_repo: &str, file: CommitFile<'_>) -> Result<String> {
    let header = json!({
        "key": "header",
        "value": {
            "summary": format!("Upload {}", path_in_repo),
            "description": "",
        },
    });
    let file = match file {
        CommitFile::Inline(contents) => json!({
            "key": "file",
            "value": {
                "content": STANDARD.encode(contents),
                "path": path_in_repo,
                "encoding": "base64",
            },
        }),
        CommitFile::Lfs(info) => json!({
            "key": "lfsFile",
            "value": {
                "path": path_in_repo,
                "algo": "sha256",
                "oid": info.sha256,
                "size": info.size,
            },
        }),
    };

    Ok(format!(
        "{}\n{}\n",
        serde_json::to_string(&header)?,
        serde_json::to_string(&file)?
    ))
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadFile {
    path: String,
    upload_mode: UploadMode,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObject>,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    oid: String,
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
struct LfsActions {
    upload: Option<LfsAction>,
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectError {
    code: i64,
    message: String,
}

/// Hugging Face Hub client for a single dataset repository
pub struct HubClient {
    client: Client,
    endpoint: String,
    repo_id: String,
    token: Option<String>,
}

impl HubClient {
    pub fn new(endpoint: impl Into<String>, repo_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: blocking_client(),
            endpoint: endpoint.into(),
            repo_id: repo_id.into(),
            token,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.hub_endpoint.clone(),
            config.hub_repo.clone(),
            config.hub_token.clone(),
        )
    }

    fn base(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    fn commit_url(&self) -> String {
        format!("{}/api/datasets/{}/commit/main", self.base(), self.repo_id)
    }

    fn preupload_url(&self) -> String {
        format!("{}/api/datasets/{}/preupload/main", self.base(), self.repo_id)
    }

    fn lfs_batch_url(&self) -> String {
        format!(
            "{}/datasets/{}.git/info/lfs/objects/batch",
            self.base(),
            self.repo_id
        )
    }

    fn resolve_url(&self, path_in_repo: &str) -> String {
        format!(
            "{}/datasets/{}/resolve/main/{}",
            self.base(),
            self.repo_id,
            path_in_repo
        )
    }

    /// Download `path_in_repo` from the dataset repository to `dest`
    pub fn download_file(&self, path_in_repo: &str, dest: &Path) -> Result<()> {
        let mut request = self.client.get(self.resolve_url(path_in_repo));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let mut response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Source(format!(
                "{} returned {}",
                self.resolve_url(path_in_repo),
                status
            )));
        }

        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = File::create(dest)?;
        response.copy_to(&mut file)?;

        info!(repo = %self.repo_id, file = path_in_repo, dest = %dest.display(), "Downloaded dataset file");
        Ok(())
    }

    /// Ask the Hub whether the file goes inline or through LFS
    fn preupload(&self, token: &str, path_in_repo: &str, info: &FileInfo) -> Result<UploadMode> {
        let body = json!({
            "files": [{
                "path": path_in_repo,
                "sample": STANDARD.encode(&info.sample),
                "size": info.size,
            }],
        });

        let response = self
            .client
            .post(self.preupload_url())
            .bearer_auth(token)
            .json(&body)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Upload(format!("{} returned {}: {}", self.preupload_url(), status, text)));
        }

        let parsed: PreuploadResponse = response.json()?;
        parsed
            .files
            .into_iter()
            .find(|f| f.path == path_in_repo)
            .map(|f| f.upload_mode)
            .ok_or_else(|| Error::Upload(format!("no upload mode returned for {}", path_in_repo)))
    }

    /// Push the file to LFS storage unless the Hub already has it
    fn upload_lfs(&self, token: &str, local: &Path, info: &FileInfo) -> Result<()> {
        let body = json!({
            "operation": "upload",
            "transfers": ["basic"],
            "objects": [{ "oid": info.sha256, "size": info.size }],
            "hash_algo": "sha256",
        });

        let response = self
            .client
            .post(self.lfs_batch_url())
            .bearer_auth(token)
            .header("Accept", LFS_MEDIA_TYPE)
            .header("Content-Type", LFS_MEDIA_TYPE)
            .body(serde_json::to_string(&body)?)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Upload(format!("{} returned {}: {}", self.lfs_batch_url(), status, text)));
        }

        let batch: LfsBatchResponse = response.json()?;
        let object = batch
            .objects
            .into_iter()
            .find(|o| o.oid == info.sha256)
            .ok_or_else(|| Error::Upload("LFS batch response has no entry for the file".to_string()))?;

        if let Some(err) = object.error {
            return Err(Error::Upload(format!("LFS rejected the file ({}): {}", err.code, err.message)));
        }

        let Some(actions) = object.actions else {
            debug!(oid = %info.sha256, "LFS object already stored");
            return Ok(());
        };

        if let Some(upload) = actions.upload {
            let mut request = self
                .client
                .put(&upload.href)
                .body(Body::sized(File::open(local)?, info.size));
            for (name, value) in &upload.header {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = request.send()?;
            let status = response.status();
            if !status.is_success() {
                let text = response
                    .text()
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(Error::Upload(format!("LFS upload returned {}: {}", status, text)));
            }
            info!(oid = %info.sha256, size = info.size, "Uploaded LFS object");
        }

        if let Some(verify) = actions.verify {
            let mut request = self
                .client
                .post(&verify.href)
                .bearer_auth(token)
                .json(&json!({ "oid": info.sha256, "size": info.size }));
            for (name, value) in &verify.header {
                request = request.header(name.as_str(), value.as_str());
            }

            let status = request.send()?.status();
            if !status.is_success() {
                return Err(Error::Upload(format!("LFS verify returned {}", status)));
            }
        }

        Ok(())
    }

    fn commit(&self, token: &str, payload: String) -> Result<()> {
        let response = self
            .client
            .post(self.commit_url())
            .bearer_auth(token)
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Upload(format!("{} returned {}: {}", self.commit_url(), status, text)));
        }
        Ok(())
    }
}

impl BlobUploader for HubClient {
    fn upload_file(&self, local: &Path, path_in_repo: &str) -> Result<()> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| Error::MissingToken(HUB_TOKEN_ENV.to_string()))?;

        let info = FileInfo::read(local)?;
        let mode = self.preupload(token, path_in_repo, &info)?;
        info!(
            repo = %self.repo_id,
            file = path_in_repo,
            size = info.size,
            mode = ?mode,
            "Starting upload to Hugging Face"
        );

        let payload = match mode {
            UploadMode::Regular => {
                let contents = fs::read(local)?;
                build_commit_payload(path_in_repo, CommitFile::Inline(&contents))?
            }
            UploadMode::Lfs => {
                self.upload_lfs(token, local, &info)?;
                build_commit_payload(path_in_repo, CommitFile::Lfs(&info))?
            }
        };
        self.commit(token, payload)?;

        info!(repo = %self.repo_id, "Upload complete");
        Ok(())
    }
}

/// Loads the published table: downloads it next to the local copy, then reads it
pub struct HubTableLoader {
    client: HubClient,
    path_in_repo: String,
    dest: PathBuf,
}

impl HubTableLoader {
    pub fn new(client: HubClient, path_in_repo: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            client,
            path_in_repo: path_in_repo.into(),
            dest: dest.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            HubClient::from_config(config),
            config.table_file.clone(),
            config.table_path(),
        )
    }
}

impl TableLoader for HubTableLoader {
    fn load(&self) -> Result<Vec<IncidentRecord>> {
        self.client.download_file(&self.path_in_repo, &self.dest)?;
        read_table(&self.dest)
    }
}
