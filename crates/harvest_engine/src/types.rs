use std::fmt;
use std::time::Duration;

use harvest_core::{
    AssembleError, CallerError, HarvestSession, Message, SessionState, Snowflake, StopReason,
};
use serde::{Deserialize, Serialize};

use crate::TransportError;

/// Snapshot emitted after every page the harvester absorbs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestProgress {
    pub request_number: u32,
    /// Cursor the page was requested with (`None` for the newest page).
    pub cursor: Option<Snowflake>,
    pub page_size: u8,
    pub page_len: usize,
    pub rate_limit_retries: u32,
    pub elapsed_ms: u64,
    pub collected_count: usize,
    pub state: SessionState,
}

#[derive(Debug)]
pub enum EngineEvent {
    Progress(HarvestProgress),
    RateLimited {
        cursor: Option<Snowflake>,
        wait: Duration,
    },
    /// The loop has exited; `state` is `Done` or `Failed`.
    HarvestFinished {
        state: SessionState,
        stop_reason: Option<StopReason>,
        attempts: u32,
        collected_count: usize,
    },
    HarvestCompleted(Box<HarvestOutcome>),
    ChannelsListed {
        guild_id: Snowflake,
        result: Result<Vec<ChannelSummary>, FetchError>,
    },
}

/// Final state of a background harvest: the session (with everything
/// collected) and the assembled slice or the error that prevented it.
#[derive(Debug)]
pub struct HarvestOutcome {
    pub session: HarvestSession,
    pub result: Result<Vec<Message>, HarvestError>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarvestError {
    #[error(transparent)]
    Caller(#[from] CallerError),
    #[error("remote error: {0}")]
    Remote(#[from] FetchError),
    #[error(transparent)]
    Consistency(#[from] AssembleError),
}

/// Terminal failure of a remote request. Rate limiting never ends up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub status: Option<u16>,
    /// Response body or transport message, kept for diagnostics.
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub(crate) fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self::new(FailureKind::from_status(status), Some(status), body)
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        let kind = match &err {
            TransportError::Timeout(_) => FailureKind::Timeout,
            TransportError::Network(_) | TransportError::InvalidRequest(_) => FailureKind::Network,
        };
        Self::new(kind, None, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Unauthorized,
    /// The credential is valid but may not read this channel.
    Forbidden,
    UnknownChannel,
    HttpStatus(u16),
    Network,
    Timeout,
    InvalidBody,
}

impl FailureKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => FailureKind::Unauthorized,
            403 => FailureKind::Forbidden,
            404 => FailureKind::UnknownChannel,
            other => FailureKind::HttpStatus(other),
        }
    }

    pub fn is_wrong_context(&self) -> bool {
        matches!(self, FailureKind::Forbidden | FailureKind::UnknownChannel)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Unauthorized => write!(f, "unauthorized"),
            FailureKind::Forbidden => write!(f, "missing access to channel"),
            FailureKind::UnknownChannel => write!(f, "unknown channel"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::InvalidBody => write!(f, "invalid response body"),
        }
    }
}

/// Channel types as reported by the remote store.
pub const TEXT_CHANNEL_TYPE: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub position: i64,
}
