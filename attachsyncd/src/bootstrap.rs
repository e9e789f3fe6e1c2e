use anyhow::Context;
use attachsync_core::{
    ApiErrorClass, OAuthClient, OAuthError, SourceClient, StorageClient, StorageError,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::SyncConfig;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("source service rejected the configured credentials: {0}")]
    Source(#[source] OAuthError),
    #[error("destination storage rejected the configured token: {0}")]
    Destination(#[source] StorageError),
}

/// Authenticated clients for both ends of the mirror.
pub struct Clients {
    pub source: SourceClient,
    pub destination: StorageClient,
}

pub async fn connect(config: &SyncConfig) -> anyhow::Result<Clients> {
    let credentials = &config.source_credentials;
    let oauth = OAuthClient::with_base_url(
        &config.source_api_url,
        credentials.client_id.clone(),
        credentials.client_secret.clone(),
    )
    .context("invalid source api url")?;

    let token = match oauth
        .password_grant(&credentials.username, &credentials.password)
        .await
    {
        Ok(token) => token,
        Err(err) if err.is_rejected_credentials() => return Err(AuthError::Source(err).into()),
        Err(err) => return Err(err).context("failed to authenticate with the source service"),
    };
    info!(user = %credentials.username, "authenticated with source service");

    let source = SourceClient::with_base_url(&config.source_api_url, token.access_token)
        .context("invalid source api url")?;
    let destination =
        StorageClient::with_base_url(&config.destination_api_url, config.destination_token.clone())
            .context("invalid destination api url")?;

    match destination.get_disk_info().await {
        Ok(info) => debug!(
            total_space = info.total_space,
            used_space = info.used_space,
            "destination storage reachable"
        ),
        Err(err) if err.classification() == Some(ApiErrorClass::Auth) => {
            return Err(AuthError::Destination(err).into());
        }
        Err(err) => return Err(err).context("failed to reach destination storage"),
    }

    Ok(Clients {
        source,
        destination,
    })
}
