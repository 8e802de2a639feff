use std::sync::Arc;
use std::time::Duration;

use harvest_core::{Credential, Message, Snowflake};
use harvest_logging::{harvest_debug, harvest_error, harvest_warn};

use crate::transport::{ApiRequest, PageRequest, Transport, TransportResponse};
use crate::{ChannelSummary, EngineEvent, FailureKind, FetchError, TEXT_CHANNEL_TYPE};

/// Wait used when a rate-limited response carries no usable suggestion.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub default_rate_limit_wait: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            default_rate_limit_wait: DEFAULT_RATE_LIMIT_WAIT,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: EngineEvent) {}
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Messages in server order, newest first.
    pub messages: Vec<Message>,
    /// How many rate-limited responses were waited out for this page.
    pub rate_limit_retries: u32,
}

/// Issues single page requests, absorbing rate limits along the way.
///
/// Holds no state between calls; every call retries its own request until it
/// gets a non-429 answer.
#[derive(Clone)]
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    settings: FetchSettings,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn Transport>, settings: FetchSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub async fn fetch_page(
        &self,
        request: &PageRequest,
        sink: &dyn ProgressSink,
    ) -> Result<FetchedPage, FetchError> {
        let api_request = ApiRequest::Messages(request.clone());
        let (response, rate_limit_retries) = self.send_until_answered(&api_request, sink).await?;
        let messages = parse_body::<Vec<Message>>(&response)?;
        Ok(FetchedPage {
            messages,
            rate_limit_retries,
        })
    }

    /// Text channels of a guild, ordered by their position in the sidebar.
    pub async fn list_channels(
        &self,
        guild_id: &Snowflake,
        credential: &Credential,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<ChannelSummary>, FetchError> {
        let api_request = ApiRequest::GuildChannels {
            guild_id: guild_id.clone(),
            credential: credential.clone(),
        };
        let (response, _) = self.send_until_answered(&api_request, sink).await?;
        let mut channels: Vec<ChannelSummary> = parse_body::<Vec<ChannelSummary>>(&response)?
            .into_iter()
            .filter(|channel| channel.kind == TEXT_CHANNEL_TYPE)
            .collect();
        channels.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        Ok(channels)
    }

    async fn send_until_answered(
        &self,
        request: &ApiRequest,
        sink: &dyn ProgressSink,
    ) -> Result<(TransportResponse, u32), FetchError> {
        let mut retries = 0u32;
        loop {
            harvest_debug!(
                "GET {} before={}",
                request.path(),
                request.cursor().map_or("none", |c| c.as_str())
            );
            let response = self.transport.send(request).await.map_err(|err| {
                harvest_error!("Transport failure for {}: {}", request.path(), err);
                FetchError::from(err)
            })?;
            harvest_debug!("Server response: status={}", response.status);

            if response.is_rate_limited() {
                let wait = response
                    .retry_after
                    .unwrap_or(self.settings.default_rate_limit_wait);
                retries += 1;
                harvest_warn!(
                    "Rate limit hit (retry #{}), waiting {} ms before resending",
                    retries,
                    wait.as_millis()
                );
                sink.emit(EngineEvent::RateLimited {
                    cursor: request.cursor().cloned(),
                    wait,
                });
                tokio::time::sleep(wait).await;
                continue;
            }

            if !response.is_success() {
                let err = FetchError::from_status(response.status, response.body);
                harvest_error!("Request error for {}: {}", request.path(), err);
                return Err(err);
            }

            return Ok((response, retries));
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(response: &TransportResponse) -> Result<T, FetchError> {
    serde_json::from_str(&response.body).map_err(|err| {
        FetchError::new(FailureKind::InvalidBody, Some(response.status), err.to_string())
    })
}
