use std::time::Instant;

use harvest_core::{
    assemble, HarvestRequest, HarvestSession, Message, PageVerdict, StopReason,
};
use harvest_logging::{harvest_debug, harvest_error, harvest_info};
use tokio_util::sync::CancellationToken;

use crate::fetch::{PageFetcher, ProgressSink};
use crate::transport::PageRequest;
use crate::{EngineEvent, HarvestError, HarvestProgress};

/// Drives the page loop for one harvest.
pub struct Harvester<'a> {
    fetcher: &'a PageFetcher,
    sink: &'a dyn ProgressSink,
}

impl<'a> Harvester<'a> {
    pub fn new(fetcher: &'a PageFetcher, sink: &'a dyn ProgressSink) -> Self {
        Self { fetcher, sink }
    }

    /// Pages backwards from the newest message until a stop condition fires.
    ///
    /// `cancel` is only looked at between requests, so a request that is in
    /// flight (including its rate-limit retries) always runs to completion.
    /// On a remote error the session is left `Failed` with its partial
    /// `collected` intact.
    pub async fn run(
        &self,
        request: &HarvestRequest,
        session: &mut HarvestSession,
        cancel: &CancellationToken,
    ) -> Result<Option<StopReason>, HarvestError> {
        session.start()?;
        let range = request.range();
        harvest_info!(
            "Harvesting channel {} between {} and {}",
            request.channel_id(),
            range.older(),
            range.newer()
        );

        while let Some(request_number) =
            session.begin_request(request.max_attempts(), cancel.is_cancelled())
        {
            let started = Instant::now();
            let page_request = PageRequest {
                channel_id: request.channel_id().clone(),
                cursor: session.cursor().cloned(),
                page_size: request.page_size(),
                credential: request.credential().clone(),
            };
            harvest_info!(
                "Request #{}, before={}",
                request_number,
                page_request.cursor.as_ref().map_or("none", |c| c.as_str())
            );

            let page = match self.fetcher.fetch_page(&page_request, self.sink).await {
                Ok(page) => page,
                Err(err) => {
                    harvest_error!("Harvest failed on request #{}: {}", request_number, err);
                    session.fail();
                    self.emit_finished(session);
                    return Err(err.into());
                }
            };

            let verdict = session.absorb_page(range, &page.messages);
            self.sink.emit(EngineEvent::Progress(HarvestProgress {
                request_number,
                cursor: page_request.cursor,
                page_size: page_request.page_size,
                page_len: page.messages.len(),
                rate_limit_retries: page.rate_limit_retries,
                elapsed_ms: started.elapsed().as_millis() as u64,
                collected_count: session.collected().len(),
                state: session.state(),
            }));

            if let PageVerdict::Stop(reason) = verdict {
                harvest_info!("Stopping after request #{}: {:?}", request_number, reason);
                break;
            }

            let wait = request.delay().saturating_sub(started.elapsed());
            if !wait.is_zero() {
                harvest_debug!("Waiting {} ms before next request", wait.as_millis());
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        let reason = session.finish();
        if reason == Some(StopReason::Cancelled) {
            harvest_info!(
                "Harvest cancelled, {} messages salvaged",
                session.collected().len()
            );
        }
        self.emit_finished(session);
        Ok(reason)
    }

    fn emit_finished(&self, session: &HarvestSession) {
        self.sink.emit(EngineEvent::HarvestFinished {
            state: session.state(),
            stop_reason: session.stop_reason(),
            attempts: session.attempt_count(),
            collected_count: session.collected().len(),
        });
    }
}

/// Runs the loop and cuts the anchored slice out of what was collected.
///
/// The session stays with the caller, so collected messages remain available
/// when the remote fails or an anchor turns out to be missing.
pub async fn harvest_range(
    fetcher: &PageFetcher,
    sink: &dyn ProgressSink,
    request: &HarvestRequest,
    session: &mut HarvestSession,
    cancel: &CancellationToken,
) -> Result<Vec<Message>, HarvestError> {
    Harvester::new(fetcher, sink)
        .run(request, session, cancel)
        .await?;
    let slice = assemble(session.collected(), request.anchors())?;
    harvest_info!("Assembled {} messages", slice.len());
    Ok(slice)
}
