use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::{Anchors, IdError, Range, Snowflake};

pub const MAX_PAGE_SIZE: u8 = 100;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2000;

/// Problems with what the caller asked for. Raised before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallerError {
    #[error("access credential is missing")]
    MissingCredential,
    #[error("channel id is missing")]
    MissingChannel,
    #[error("invalid channel context: {0}")]
    InvalidContext(String),
    #[error("{0} message id is missing")]
    MissingAnchor(AnchorSlot),
    #[error("malformed {field}: {source}")]
    MalformedId {
        field: &'static str,
        #[source]
        source: IdError,
    },
    #[error("delay must be zero or more milliseconds, got {0}")]
    InvalidDelay(i64),
    #[error("page size must be between 1 and 100, got {0}")]
    InvalidPageSize(u32),
    #[error("attempt cap must be at least 1")]
    InvalidAttemptCap,
    #[error("a harvest is already running")]
    HarvestAlreadyRunning,
}

/// Which of the two typed-in anchor fields a problem refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSlot {
    Start,
    End,
}

impl fmt::Display for AnchorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorSlot::Start => write!(f, "start"),
            AnchorSlot::End => write!(f, "end"),
        }
    }
}

/// Opaque access credential. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Unvalidated harvest parameters as gathered from the user.
#[derive(Debug, Clone)]
pub struct HarvestInput {
    pub channel_id: Option<String>,
    pub credential: Option<Credential>,
    pub start_id: Option<String>,
    pub end_id: Option<String>,
    pub delay_ms: i64,
    pub page_size: u32,
    pub max_attempts: u32,
}

impl Default for HarvestInput {
    fn default() -> Self {
        Self {
            channel_id: None,
            credential: None,
            start_id: None,
            end_id: None,
            delay_ms: 0,
            page_size: u32::from(MAX_PAGE_SIZE),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl HarvestInput {
    pub fn validate(self) -> Result<HarvestRequest, CallerError> {
        let credential = match self.credential {
            Some(c) if !c.expose().trim().is_empty() => Credential::new(c.expose().trim()),
            _ => return Err(CallerError::MissingCredential),
        };

        let channel_raw = non_blank(self.channel_id).ok_or(CallerError::MissingChannel)?;
        let channel_id = Snowflake::parse(&channel_raw).map_err(|source| CallerError::MalformedId {
            field: "channel id",
            source,
        })?;

        let start = parse_anchor(self.start_id, AnchorSlot::Start)?;
        let end = parse_anchor(self.end_id, AnchorSlot::End)?;

        if self.delay_ms < 0 {
            return Err(CallerError::InvalidDelay(self.delay_ms));
        }
        let page_size = match u8::try_from(self.page_size) {
            Ok(size @ 1..=MAX_PAGE_SIZE) => size,
            _ => return Err(CallerError::InvalidPageSize(self.page_size)),
        };
        if self.max_attempts == 0 {
            return Err(CallerError::InvalidAttemptCap);
        }

        let anchors = Anchors::new(start, end);
        Ok(HarvestRequest {
            channel_id,
            credential,
            range: anchors.range(),
            anchors,
            delay: Duration::from_millis(self.delay_ms.unsigned_abs()),
            page_size,
            max_attempts: self.max_attempts,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_anchor(raw: Option<String>, slot: AnchorSlot) -> Result<Snowflake, CallerError> {
    let raw = non_blank(raw).ok_or(CallerError::MissingAnchor(slot))?;
    Snowflake::parse(&raw).map_err(|source| CallerError::MalformedId {
        field: match slot {
            AnchorSlot::Start => "start message id",
            AnchorSlot::End => "end message id",
        },
        source,
    })
}

/// A validated harvest: everything the engine needs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestRequest {
    channel_id: Snowflake,
    credential: Credential,
    anchors: Anchors,
    range: Range,
    delay: Duration,
    page_size: u8,
    max_attempts: u32,
}

impl HarvestRequest {
    pub fn channel_id(&self) -> &Snowflake {
        &self.channel_id
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn anchors(&self) -> &Anchors {
        &self.anchors
    }

    pub fn range(&self) -> &Range {
        &self.range
    }

    /// Minimum time between the starts of two consecutive page requests.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn page_size(&self) -> u8 {
        self.page_size
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
