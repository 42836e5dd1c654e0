use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::{DisplayOptions, OriginPolicy, oembed_request_url, resolve_display_url};
use crate::error::DisplayError;

/// oEmbed discovery response. Only `html` is used to build the embed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OEmbedDescriptor {
    pub html: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Why the descriptor could not be retrieved.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("\"{0}\" was not found.")]
    NotFound(String),

    #[error("\"{0}\" is not embeddable.")]
    NotEmbeddable(String),

    #[error("There was an error fetching the embed code (status {0}).")]
    Status(u16),

    #[error("There was an error fetching the embed code: {0}")]
    Transport(String),

    #[error("The embed code could not be decoded: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Issues the oEmbed GET request.
#[async_trait(?Send)]
pub trait OEmbedClient {
    async fn get(&self, url: &Url) -> Result<HttpResponse, FetchError>;
}

/// Fetch and classify the oEmbed descriptor for `options`.
pub async fn fetch_descriptor<C: OEmbedClient + ?Sized>(
    client: &C,
    options: &DisplayOptions,
    policy: &OriginPolicy,
) -> Result<OEmbedDescriptor, DisplayError> {
    let display_url = resolve_display_url(options, policy)?;
    let request = oembed_request_url(options, policy)?;
    debug!(%request, "Requesting oEmbed descriptor");

    let response = client.get(&request).await?;
    match response.status {
        200..=299 => serde_json::from_str(&response.body)
            .map_err(|error| FetchError::Malformed(error.to_string()).into()),
        404 => Err(FetchError::NotFound(display_url).into()),
        403 => Err(FetchError::NotEmbeddable(display_url).into()),
        status => Err(FetchError::Status(status).into()),
    }
}
