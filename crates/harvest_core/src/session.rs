use std::collections::BTreeMap;

use crate::{CallerError, Message, Range, Snowflake};

/// Messages gathered so far, keyed and therefore ordered by id.
pub type Collected = BTreeMap<Snowflake, Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    /// Cancellation was observed; the loop is winding down.
    Stopping,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Stopping)
    }
}

/// Why a harvest stopped without a remote error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    AttemptCapReached,
    /// The remote returned an empty page.
    Exhausted,
    /// The oldest id of a page equalled the cursor it was requested with.
    Stagnated,
    ReachedOlderBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    Continue,
    Stop(StopReason),
}

/// Mutable state of one harvest run.
///
/// The session is owned by whoever starts the harvest and lent to the loop.
/// After a failure it still holds everything collected up to that point.
#[derive(Debug, Clone, Default)]
pub struct HarvestSession {
    state: SessionState,
    cursor: Option<Snowflake>,
    attempt_count: u32,
    collected: Collected,
    stop_reason: Option<StopReason>,
}

impl HarvestSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the session and moves it to `Running`.
    pub fn start(&mut self) -> Result<(), CallerError> {
        if self.state.is_active() {
            return Err(CallerError::HarvestAlreadyRunning);
        }
        *self = Self {
            state: SessionState::Running,
            ..Self::default()
        };
        Ok(())
    }

    /// Decides whether another request may be issued and, if so, counts it.
    ///
    /// Returns the 1-based request number, or `None` when the loop must stop.
    pub fn begin_request(&mut self, max_attempts: u32, cancel_requested: bool) -> Option<u32> {
        if self.state != SessionState::Running {
            return None;
        }
        if cancel_requested {
            self.state = SessionState::Stopping;
            self.stop_reason = Some(StopReason::Cancelled);
            return None;
        }
        if self.attempt_count >= max_attempts {
            self.stop_reason = Some(StopReason::AttemptCapReached);
            return None;
        }
        self.attempt_count += 1;
        Some(self.attempt_count)
    }

    /// Applies one raw page (server order) and advances the cursor.
    pub fn absorb_page(&mut self, range: &Range, page: &[Message]) -> PageVerdict {
        let Some(oldest) = page.iter().map(|m| &m.id).min() else {
            return self.stop(StopReason::Exhausted);
        };
        let oldest = oldest.clone();

        self.merge(range, page);

        if self.cursor.as_ref() == Some(&oldest) {
            return self.stop(StopReason::Stagnated);
        }
        self.cursor = Some(oldest);

        if page.iter().any(|m| &m.id == range.older()) {
            return self.stop(StopReason::ReachedOlderBound);
        }
        PageVerdict::Continue
    }

    /// Keeps in-range, non-media-only messages. Returns how many survived.
    ///
    /// A message already present under the same id is overwritten, so
    /// merging the same page twice leaves `collected` unchanged.
    pub fn merge(&mut self, range: &Range, page: &[Message]) -> usize {
        let mut kept = 0;
        for message in page
            .iter()
            .filter(|m| range.contains(&m.id) && !m.is_media_only())
        {
            self.collected.insert(message.id.clone(), message.clone());
            kept += 1;
        }
        kept
    }

    /// Ends an active session normally.
    pub fn finish(&mut self) -> Option<StopReason> {
        if self.state.is_active() {
            self.state = SessionState::Done;
        }
        self.stop_reason
    }

    /// Ends an active session after a terminal error; `collected` is kept.
    pub fn fail(&mut self) {
        if self.state.is_active() {
            self.state = SessionState::Failed;
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cursor(&self) -> Option<&Snowflake> {
        self.cursor.as_ref()
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn collected(&self) -> &Collected {
        &self.collected
    }

    pub fn into_collected(self) -> Collected {
        self.collected
    }

    fn stop(&mut self, reason: StopReason) -> PageVerdict {
        self.stop_reason = Some(reason);
        PageVerdict::Stop(reason)
    }
}
