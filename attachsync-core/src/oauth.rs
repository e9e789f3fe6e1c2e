use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub(crate) const DEFAULT_SOURCE_BASE_URL: &str = "https://api.podio.com";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid base url: {0}")]
    Url(#[from] url::ParseError),
    #[error("token endpoint returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

impl OAuthError {
    /// True when the token endpoint refused the supplied credentials.
    pub fn is_rejected_credentials(&self) -> bool {
        matches!(
            self,
            OAuthError::Api { status, .. }
                if matches!(*status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        )
    }
}

/// Client credentials of the application registered with the source service.
#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        Self::with_base_url(DEFAULT_SOURCE_BASE_URL, client_id, client_secret)
    }

    pub fn with_base_url(
        base_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// Exchanges a user's name and password for an access token.
    pub async fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> Result<OAuthToken, OAuthError> {
        let url = self.base_url.join("/oauth/token")?;
        let form = [
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self.http.post(url).form(&form).send().await?;
        if response.status().is_success() {
            Ok(response.json::<OAuthToken>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(OAuthError::Api { status, body })
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
