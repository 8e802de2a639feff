use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use harvest_core::{CallerError, Credential, HarvestRequest, HarvestSession, Snowflake};
use harvest_logging::{harvest_error, harvest_info, harvest_warn};
use tokio_util::sync::CancellationToken;

use crate::fetch::{ChannelProgressSink, FetchSettings, PageFetcher};
use crate::harvest::harvest_range;
use crate::transport::{ReqwestTransport, Transport, TransportError, TransportSettings};
use crate::{EngineEvent, HarvestOutcome};

enum EngineCommand {
    Harvest {
        request: HarvestRequest,
        cancel: CancellationToken,
        /// Cancelled once the harvest has completed.
        finished: CancellationToken,
    },
    ListChannels {
        guild_id: Snowflake,
        credential: Credential,
    },
}

/// Runs harvests on a background tokio runtime and reports back over a channel.
///
/// At most one harvest runs at a time; [`EngineHandle::stop`] cancels it
/// cooperatively.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    running: Arc<AtomicBool>,
    cancel: Arc<Mutex<Option<CancellationToken>>>,
    stop_on_interrupt: bool,
}

impl EngineHandle {
    pub fn new(transport: TransportSettings, fetch: FetchSettings) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(transport)?;
        Ok(Self::with_transport(Arc::new(transport), fetch))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, settings: FetchSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let fetcher = Arc::new(PageFetcher::new(transport, settings));
        let running = Arc::new(AtomicBool::new(false));
        let worker_running = running.clone();
        let cancel = Arc::new(Mutex::new(None));
        let worker_cancel = cancel.clone();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    harvest_error!("Failed to start engine runtime: {}", err);
                    return;
                }
            };
            while let Ok(command) = cmd_rx.recv() {
                let fetcher = fetcher.clone();
                let event_tx = event_tx.clone();
                let running = worker_running.clone();
                let cancel_slot = worker_cancel.clone();
                runtime.spawn(async move {
                    handle_command(fetcher.as_ref(), command, event_tx, running, cancel_slot)
                        .await;
                });
            }
        });

        Self {
            cmd_tx,
            event_rx,
            running,
            cancel,
            stop_on_interrupt: false,
        }
    }

    /// Makes Ctrl-C cancel the running harvest instead of killing the process.
    pub fn stop_on_interrupt(mut self) -> Self {
        self.stop_on_interrupt = true;
        self
    }

    pub fn start_harvest(&self, request: HarvestRequest) -> Result<(), CallerError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CallerError::HarvestAlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        if let Ok(mut slot) = self.cancel.lock() {
            *slot = Some(cancel.clone());
        }
        if self.stop_on_interrupt {
            watch_interrupt(cancel.clone(), finished.clone());
        }

        let command = EngineCommand::Harvest {
            request,
            cancel,
            finished: finished.clone(),
        };
        if self.cmd_tx.send(command).is_err() {
            harvest_error!("Engine worker is gone; harvest not started");
            clear_slot(&self.cancel);
            finished.cancel();
            self.running.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    pub fn list_channels(&self, guild_id: Snowflake, credential: Credential) {
        let _ = self.cmd_tx.send(EngineCommand::ListChannels {
            guild_id,
            credential,
        });
    }

    /// Requests cancellation of the running harvest.
    ///
    /// Returns `false` when no harvest was running.
    pub fn stop(&self) -> bool {
        let Ok(slot) = self.cancel.lock() else {
            return false;
        };
        match slot.as_ref() {
            Some(cancel) => {
                harvest_info!("Harvest stop requested");
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Blocks until the next event; `None` once the worker has shut down.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }
}

// The watcher lives on its own thread so it does not depend on the
// worker runtime's lifetime.
fn watch_interrupt(cancel: CancellationToken, finished: CancellationToken) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                harvest_error!("Failed to install interrupt handler: {}", err);
                return;
            }
        };
        runtime.block_on(relay_interrupts(tokio::signal::ctrl_c, cancel, finished));
    });
}

/// Turns the first interrupt into a cancellation and reports every later one
/// until the harvest has finished. Returns how many interrupts were ignored.
///
/// Once registered, the signal handler stays installed for the whole process.
async fn relay_interrupts<F, Fut>(
    mut next_interrupt: F,
    cancel: CancellationToken,
    finished: CancellationToken,
) -> u32
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let mut ignored = 0;
    loop {
        tokio::select! {
            biased;
            _ = finished.cancelled() => return ignored,
            signal = next_interrupt() => {
                if let Err(err) = signal {
                    harvest_error!("Interrupt handler failed: {}", err);
                    return ignored;
                }
                if cancel.is_cancelled() {
                    ignored += 1;
                    harvest_warn!("Interrupt ignored; waiting for the current request to finish");
                } else {
                    harvest_info!("Interrupt received, finishing the current request");
                    cancel.cancel();
                }
            }
        }
    }
}

fn clear_slot(slot: &Mutex<Option<CancellationToken>>) {
    if let Ok(mut slot) = slot.lock() {
        *slot = None;
    }
}

async fn handle_command(
    fetcher: &PageFetcher,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
    running: Arc<AtomicBool>,
    cancel_slot: Arc<Mutex<Option<CancellationToken>>>,
) {
    let sink = ChannelProgressSink::new(event_tx.clone());
    match command {
        EngineCommand::Harvest {
            request,
            cancel,
            finished,
        } => {
            let mut session = HarvestSession::new();
            let result = harvest_range(fetcher, &sink, &request, &mut session, &cancel).await;
            // The slot is cleared while `running` still blocks a new start.
            clear_slot(&cancel_slot);
            running.store(false, Ordering::SeqCst);
            finished.cancel();
            let _ = event_tx.send(EngineEvent::HarvestCompleted(Box::new(HarvestOutcome {
                session,
                result,
            })));
        }
        EngineCommand::ListChannels {
            guild_id,
            credential,
        } => {
            let result = fetcher.list_channels(&guild_id, &credential, &sink).await;
            let _ = event_tx.send(EngineEvent::ChannelsListed { guild_id, result });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_interrupt_cancels_and_later_ones_are_reported() {
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        let finisher = finished.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            finisher.cancel();
        });

        let mut delivered = 0;
        let interrupts = move || {
            delivered += 1;
            let pending = delivered > 3;
            async move {
                if pending {
                    std::future::pending::<io::Result<()>>().await
                } else {
                    Ok(())
                }
            }
        };

        let ignored = relay_interrupts(interrupts, cancel.clone(), finished).await;
        assert!(cancel.is_cancelled());
        assert_eq!(ignored, 2);
    }

    #[tokio::test]
    async fn finished_harvest_releases_the_watcher() {
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        finished.cancel();

        let ignored = relay_interrupts(
            || std::future::pending::<io::Result<()>>(),
            cancel.clone(),
            finished,
        )
        .await;
        assert_eq!(ignored, 0);
        assert!(!cancel.is_cancelled());
    }
}
