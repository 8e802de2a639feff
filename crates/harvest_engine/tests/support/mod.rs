#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use harvest_core::{Author, Credential, HarvestInput, HarvestRequest, Message, Snowflake};
use harvest_engine::{
    ApiRequest, EngineEvent, ProgressSink, Transport, TransportError, TransportResponse,
};
use serde_json::json;

/// Ids larger than `u64::MAX`, so nothing can lean on native integers.
pub const BASE: u128 = 90_000_000_000_000_000_000;

pub fn id(n: u128) -> Snowflake {
    Snowflake::parse(&(BASE + n).to_string()).unwrap()
}

pub fn message(n: u128) -> Message {
    Message {
        id: id(n),
        timestamp: "2024-03-01T12:00:00+00:00".to_string(),
        author: Author {
            id: "42".to_string(),
            username: "ann".to_string(),
            discriminator: "0".to_string(),
            global_name: None,
        },
        content: format!("message {n}"),
        attachments: Vec::new(),
        embeds: Vec::new(),
    }
}

/// `len` messages, newest first; position `p` (0 = newest) has id `BASE + len - p`.
pub fn history(len: u128) -> Vec<Message> {
    (1..=len).rev().map(message).collect()
}

pub fn at_position(len: u128, position: u128) -> Snowflake {
    id(len - position)
}

type Hook = Box<dyn Fn(usize) + Send + Sync>;

/// Serves pages out of an in-memory history the way the remote does:
/// newest first, strictly older than the cursor.
pub struct HistoryTransport {
    history: Vec<Message>,
    requests: Mutex<Vec<ApiRequest>>,
    latency: Duration,
    fail_on: Option<(usize, u16)>,
    repeat_first_page: bool,
    on_request: Option<Hook>,
}

impl HistoryTransport {
    pub fn new(history: Vec<Message>) -> Self {
        Self {
            history,
            requests: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            fail_on: None,
            repeat_first_page: false,
            on_request: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answers request number `request` (1-based) with `status`.
    pub fn failing_on(mut self, request: usize, status: u16) -> Self {
        self.fail_on = Some((request, status));
        self
    }

    /// Ignores the cursor and always serves the newest page.
    pub fn stuck(mut self) -> Self {
        self.repeat_first_page = true;
        self
    }

    pub fn on_request(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_request = Some(Box::new(hook));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn cursors(&self) -> Vec<Option<Snowflake>> {
        self.requests()
            .iter()
            .map(|r| r.cursor().cloned())
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for HistoryTransport {
    async fn send(&self, request: &ApiRequest) -> Result<TransportResponse, TransportError> {
        let number = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        if let Some(hook) = &self.on_request {
            hook(number);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some((fail_at, status)) = self.fail_on {
            if fail_at == number {
                return Ok(TransportResponse {
                    status,
                    body: json!({"message": "401: Unauthorized", "code": 0}).to_string(),
                    retry_after: None,
                });
            }
        }

        let ApiRequest::Messages(page) = request else {
            panic!("unexpected request {request:?}");
        };
        let cursor = if self.repeat_first_page {
            None
        } else {
            page.cursor.clone()
        };
        let served: Vec<&Message> = self
            .history
            .iter()
            .filter(|m| cursor.as_ref().map_or(true, |c| &m.id < c))
            .take(usize::from(page.page_size))
            .collect();

        Ok(TransportResponse {
            status: 200,
            body: serde_json::to_string(&served).unwrap(),
            retry_after: None,
        })
    }
}

#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn request(start: &Snowflake, end: &Snowflake, delay_ms: i64) -> HarvestRequest {
    HarvestInput {
        channel_id: Some("381870553235193857".to_string()),
        credential: Some(Credential::new("test-token")),
        start_id: Some(start.to_string()),
        end_id: Some(end.to_string()),
        delay_ms,
        ..HarvestInput::default()
    }
    .validate()
    .unwrap()
}
