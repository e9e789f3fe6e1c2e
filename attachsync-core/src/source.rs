use std::io;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::api::{ApiErrorClass, classify_api_status};
use crate::oauth::DEFAULT_SOURCE_BASE_URL;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

impl SourceError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            SourceError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }
}

/// Client for the content service that owns organizations, spaces and the
/// files attached to their records.
#[derive(Clone)]
pub struct SourceClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl SourceClient {
    pub fn new(token: impl Into<String>) -> Result<Self, SourceError> {
        Self::with_base_url(DEFAULT_SOURCE_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, SourceError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Organizations visible to the authenticated user, each with its spaces.
    pub async fn list_organizations(&self) -> Result<Vec<Organization>, SourceError> {
        let url = self.endpoint("/org/")?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn list_space_files(
        &self,
        space_id: u64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SourceFile>, SourceError> {
        let mut url = self.endpoint(&format!("/file/space/{space_id}/"))?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn get_item(&self, item_id: u64) -> Result<ParentItem, SourceError> {
        let url = self.endpoint(&format!("/item/{item_id}"))?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Streams the raw bytes of a file to `target`.
    ///
    /// Bytes land in a `.partial` sibling first and are renamed into place
    /// once the body has been fully written.
    pub async fn download_file(&self, file_id: u64, target: &Path) -> Result<(), SourceError> {
        let url = self.endpoint(&format!("/file/{file_id}/raw"))?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api { status, body });
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(target);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        tokio::fs::rename(partial, target).await?;
        Ok(())
    }

    fn auth_header_value(&self) -> String {
        format!("OAuth2 {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, SourceError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SourceError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(SourceError::Api { status, body })
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!(
        "{}partial",
        target
            .extension()
            .map(|ext| format!("{}.", ext.to_string_lossy()))
            .unwrap_or_default()
    ))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Organization {
    #[serde(rename = "org_id")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub spaces: Vec<Space>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Space {
    #[serde(rename = "space_id")]
    pub id: u64,
    pub name: String,
}

/// A file attachment together with what it is attached to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SourceFile {
    #[serde(rename = "file_id")]
    pub id: u64,
    pub name: String,
    pub created_by: Author,
    /// The record that owns the file.
    #[serde(rename = "data_ref")]
    pub subject: Reference,
    /// Where the owning record lives.
    pub context: Reference,
}

impl SourceFile {
    pub fn author_name(&self) -> &str {
        &self.created_by.name
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Author {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct Reference {
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
    pub id: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Status,
    Item,
    Task,
    Comment,
    Space,
    App,
    Conversation,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ParentItem {
    #[serde(rename = "item_id")]
    pub id: u64,
    pub title: String,
    pub app: Application,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Application {
    #[serde(rename = "app_id")]
    pub id: u64,
    pub name: String,
}
