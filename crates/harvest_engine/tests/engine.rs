mod support;

use std::sync::Arc;
use std::time::Duration;

use harvest_core::{CallerError, SessionState, StopReason};
use harvest_engine::{EngineEvent, EngineHandle, FetchSettings, HarvestOutcome};
use support::{at_position, history, request, HistoryTransport};

const WAIT: Duration = Duration::from_secs(10);

fn wait_for_outcome(engine: &EngineHandle) -> HarvestOutcome {
    loop {
        match engine.recv_timeout(WAIT) {
            Some(EngineEvent::HarvestCompleted(outcome)) => return *outcome,
            Some(_) => continue,
            None => panic!("engine did not complete in time"),
        }
    }
}

#[test]
fn engine_runs_one_harvest_at_a_time() {
    harvest_logging::initialize_for_tests();
    let transport =
        Arc::new(HistoryTransport::new(history(240)).with_latency(Duration::from_millis(30)));
    let engine = EngineHandle::with_transport(transport.clone(), FetchSettings::default());
    let req = request(&at_position(240, 150), &at_position(240, 5), 0);

    engine.start_harvest(req.clone()).unwrap();
    assert!(engine.is_running());
    assert_eq!(
        engine.start_harvest(req.clone()),
        Err(CallerError::HarvestAlreadyRunning)
    );

    let outcome = wait_for_outcome(&engine);
    assert_eq!(outcome.result.unwrap().len(), 146);
    assert_eq!(outcome.session.state(), SessionState::Done);
    assert!(!engine.is_running());

    engine.start_harvest(req).unwrap();
    let again = wait_for_outcome(&engine);
    assert_eq!(again.result.unwrap().len(), 146);
    // Nothing left to cancel once the run has completed.
    assert!(!engine.stop());
    assert_eq!(transport.requests().len(), 4);
}

#[test]
fn stop_cancels_between_requests() {
    harvest_logging::initialize_for_tests();
    let transport =
        Arc::new(HistoryTransport::new(history(1_000)).with_latency(Duration::from_millis(20)));
    let engine = EngineHandle::with_transport(transport.clone(), FetchSettings::default());
    let req = request(&at_position(1_000, 999), &at_position(1_000, 0), 50);

    engine.start_harvest(req).unwrap();
    loop {
        match engine.recv_timeout(WAIT) {
            Some(EngineEvent::Progress(progress)) if progress.request_number == 1 => break,
            Some(_) => continue,
            None => panic!("no progress reported"),
        }
    }
    assert!(engine.stop());

    let outcome = wait_for_outcome(&engine);
    assert!(!engine.stop());
    assert_eq!(outcome.session.state(), SessionState::Done);
    assert_eq!(outcome.session.stop_reason(), Some(StopReason::Cancelled));
    assert!(outcome.session.attempt_count() < 10);
    assert_eq!(
        outcome.session.collected().len(),
        outcome.session.attempt_count() as usize * 100
    );
    // The oldest anchor was never reached.
    assert!(outcome.result.is_err());
}
