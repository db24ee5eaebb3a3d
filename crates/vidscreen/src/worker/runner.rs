//! The scheduling loop shared by every stage.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use super::{Schedule, Stage};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `stage` on `schedule` until `cancel` fires.
///
/// A tick that fails or panics is logged and the loop carries on with the
/// next tick. Cancellation is checked before every tick; a tick already
/// running sees the same token.
pub async fn run_stage(stage: Arc<dyn Stage>, schedule: Schedule, cancel: CancellationToken) {
    let kind = stage.kind();
    log::info!(
        "Starting {} worker (first run in {:?}, then every {:?})",
        kind,
        schedule.initial_delay,
        schedule.interval
    );

    let mut delay = schedule.initial_delay;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = schedule.interval;

        let span = info_span!("stage_tick", stage = %kind);
        let outcome = AssertUnwindSafe(stage.tick(&cancel).instrument(span))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(summary)) if summary.scanned > 0 => log::info!(
                "{} tick: {} scanned, {} advanced, {} failed",
                kind,
                summary.scanned,
                summary.advanced,
                summary.failed
            ),
            Ok(Ok(_)) => log::debug!("{} tick: nothing to do", kind),
            Ok(Err(e)) => log::error!("{} tick failed: {}", kind, e),
            Err(payload) => log::error!("{} tick panicked: {}", kind, panic_message(&*payload)),
        }
    }

    log::info!("{} worker stopped", kind);
}
