use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

use crate::api::{ApiErrorClass, classify_api_status};

const DEFAULT_BASE_URL: &str = "https://cloud-api.yandex.net";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("api response missing embedded items")]
    MissingEmbedded,
    #[error("local file has no usable name: {0}")]
    InvalidFileName(PathBuf),
    #[error("resource already exists: {0}")]
    AlreadyExists(String),
}

impl StorageError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            StorageError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }
}

/// The two fixed roots a destination path can be addressed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageRoot {
    /// The whole storage of the account.
    #[default]
    Disk,
    /// The folder reserved for this application.
    App,
}

impl StorageRoot {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageRoot::Disk => "disk",
            StorageRoot::App => "app",
        }
    }

    /// Absolute API path for `path` under this root.
    pub fn qualify(self, path: &str) -> String {
        format!("{}:/{}", self.as_str(), path.trim_start_matches('/'))
    }
}

impl fmt::Display for StorageRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageRoot {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(StorageRoot::Disk),
            "app" => Ok(StorageRoot::App),
            other => Err(format!("unknown storage root: {other}")),
        }
    }
}

#[derive(Clone)]
pub struct StorageClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl StorageClient {
    pub fn new(token: impl Into<String>) -> Result<Self, StorageError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, StorageError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    pub async fn get_disk_info(&self) -> Result<DiskInfo, StorageError> {
        let url = self.endpoint("/v1/disk")?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn list_directory(
        &self,
        path: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<ResourceList, StorageError> {
        let mut url = self.endpoint("/v1/disk/resources")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("path", path);
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(offset) = offset {
                query.append_pair("offset", &offset.to_string());
            }
        }
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let payload: ResourceListResponse = Self::handle_response(response).await?;
        payload.embedded.ok_or(StorageError::MissingEmbedded)
    }

    /// Names of the entries directly inside `folder`, at most `max_entries`.
    ///
    /// Returns `None` when the folder does not exist yet.
    pub async fn list_entry_names(
        &self,
        root: StorageRoot,
        folder: &str,
        max_entries: u32,
    ) -> Result<Option<Vec<String>>, StorageError> {
        let path = root.qualify(trim_folder(folder));
        match self.list_directory(&path, Some(max_entries), None).await {
            Ok(list) => Ok(Some(list.items.into_iter().map(|item| item.name).collect())),
            Err(err) if err.classification() == Some(ApiErrorClass::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn create_folder(&self, path: &str) -> Result<Resource, StorageError> {
        let mut url = self.endpoint("/v1/disk/resources")?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .put(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Creates every missing folder along `folder`, outermost first.
    pub async fn ensure_folder_tree(
        &self,
        root: StorageRoot,
        folder: &str,
    ) -> Result<(), StorageError> {
        let mut current = String::new();
        for segment in folder.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            match self.create_folder(&root.qualify(&current)).await {
                Ok(_) => {}
                Err(err) if err.classification() == Some(ApiErrorClass::Conflict) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    pub async fn get_upload_link(
        &self,
        path: &str,
        overwrite: bool,
    ) -> Result<TransferLink, StorageError> {
        let mut url = self.endpoint("/v1/disk/resources/upload")?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("overwrite", if overwrite { "true" } else { "false" });
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Uploads `local` into `folder`, keeping the local file name.
    ///
    /// With `create_folders` the folder tree is created first. An existing
    /// resource at the target path is reported as `AlreadyExists` and never
    /// overwritten.
    pub async fn put_file(
        &self,
        root: StorageRoot,
        folder: &str,
        local: &Path,
        create_folders: bool,
    ) -> Result<(), StorageError> {
        let name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidFileName(local.to_path_buf()))?;
        if create_folders {
            self.ensure_folder_tree(root, folder).await?;
        }

        let remote = root.qualify(&format!("{}/{}", trim_folder(folder), name));
        let link = match self.get_upload_link(&remote, false).await {
            Ok(link) => link,
            Err(err) if err.classification() == Some(ApiErrorClass::Conflict) => {
                return Err(StorageError::AlreadyExists(remote));
            }
            Err(err) => return Err(err),
        };
        let file = tokio::fs::File::open(local).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        self.http
            .put(link.href)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn auth_header_value(&self) -> String {
        format!("OAuth {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, StorageError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StorageError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StorageError::Api { status, body })
        }
    }
}

fn trim_folder(folder: &str) -> &str {
    let trimmed = folder.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DiskInfo {
    pub total_space: u64,
    pub used_space: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Resource {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Dir,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResourceList {
    pub items: Vec<Resource>,
    pub limit: u32,
    pub offset: u32,
    pub total: u32,
}

#[derive(Debug, Deserialize, Serialize)]
struct ResourceListResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<ResourceList>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TransferLink {
    pub href: Url,
    pub method: String,
    #[serde(default)]
    pub templated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifies_paths_under_root() {
        assert_eq!(StorageRoot::Disk.qualify("/Main/Acme"), "disk:/Main/Acme");
        assert_eq!(StorageRoot::App.qualify("Main"), "app:/Main");
    }

    #[test]
    fn parses_root_names() {
        assert_eq!("disk".parse::<StorageRoot>(), Ok(StorageRoot::Disk));
        assert_eq!(" App ".parse::<StorageRoot>(), Ok(StorageRoot::App));
        assert!("dropbox".parse::<StorageRoot>().is_err());
    }

    #[test]
    fn trims_trailing_slash_from_folders() {
        assert_eq!(trim_folder("/Main/Acme/Sales/"), "/Main/Acme/Sales");
        assert_eq!(trim_folder("/"), "/");
    }
}
