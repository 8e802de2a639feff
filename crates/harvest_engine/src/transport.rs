use std::time::Duration;

use harvest_core::{Credential, Snowflake};
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use thiserror::Error;
use url::Url;

/// One page of messages strictly older than `cursor` (or the newest page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub channel_id: Snowflake,
    pub cursor: Option<Snowflake>,
    pub page_size: u8,
    pub credential: Credential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    Messages(PageRequest),
    GuildChannels {
        guild_id: Snowflake,
        credential: Credential,
    },
}

impl ApiRequest {
    pub fn credential(&self) -> &Credential {
        match self {
            ApiRequest::Messages(page) => &page.credential,
            ApiRequest::GuildChannels { credential, .. } => credential,
        }
    }

    pub fn cursor(&self) -> Option<&Snowflake> {
        match self {
            ApiRequest::Messages(page) => page.cursor.as_ref(),
            ApiRequest::GuildChannels { .. } => None,
        }
    }

    /// Path relative to the API base, without query.
    pub fn path(&self) -> String {
        match self {
            ApiRequest::Messages(page) => format!("channels/{}/messages", page.channel_id),
            ApiRequest::GuildChannels { guild_id, .. } => format!("guilds/{guild_id}/channels"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    /// Server-suggested wait; only filled in for rate-limited responses.
    pub retry_after: Option<Duration>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Performs the network call for an [`ApiRequest`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<TransportResponse, TransportError>;
}

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v9/";

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub api_base: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("msgharvest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    api_base: Url,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        let mut base = settings.api_base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let api_base = Url::parse(&base)
            .map_err(|err| TransportError::InvalidRequest(format!("api base {base}: {err}")))?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent)
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))?;

        Ok(Self { client, api_base })
    }

    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let mut url = self
            .api_base
            .join(&request.path())
            .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;
        if let ApiRequest::Messages(page) = request {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &page.page_size.to_string());
            if let Some(cursor) = &page.cursor {
                query.append_pair("before", cursor.as_str());
            }
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<TransportResponse, TransportError> {
        let url = self.url_for(request)?;
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, request.credential().expose())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let header_wait = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.map_err(map_reqwest_error)?;

        let retry_after = if status == 429 {
            parse_retry_after(&body, header_wait.as_deref())
        } else {
            None
        };

        Ok(TransportResponse {
            status,
            body,
            retry_after,
        })
    }
}

/// Reads the suggested wait from a rate-limit response.
///
/// The JSON body's `retry_after` (seconds, fractional) wins over the
/// `Retry-After` header. Returns `None` when neither holds a usable value.
pub fn parse_retry_after(body: &str, header: Option<&str>) -> Option<Duration> {
    let from_body = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("retry_after").and_then(serde_json::Value::as_f64));
    let from_header = header.and_then(|value| value.trim().parse::<f64>().ok());

    from_body
        .or(from_header)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout(err.to_string());
    }
    if err.is_builder() {
        return TransportError::InvalidRequest(err.to_string());
    }
    TransportError::Network(err.to_string())
}
