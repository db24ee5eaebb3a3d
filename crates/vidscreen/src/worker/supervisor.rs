//! Starts the seven stage loops and shuts them down together.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{
    run_stage, CompletionStage, FilterStage, ReportStage, Schedule, ScriptStage, SemanticStage,
    Stage, StageKind, SurveyStage, TranscriptionStage, WorkerContext,
};
use crate::config::WorkersConfig;
use crate::lock::ExclusiveLock;

/// All seven stages over one context.
pub fn all_stages(ctx: &WorkerContext) -> Vec<Arc<dyn Stage>> {
    let stages: [Arc<dyn Stage>; 7] = [
        Arc::new(SurveyStage::new(ctx.clone())),
        Arc::new(ScriptStage::new(ctx.clone())),
        Arc::new(TranscriptionStage::new(ctx.clone())),
        Arc::new(SemanticStage::new(ctx.clone())),
        Arc::new(CompletionStage::new(ctx.clone())),
        Arc::new(FilterStage::new(ctx.clone())),
        Arc::new(ReportStage::new(ctx.clone())),
    ];
    stages.into()
}

/// Owns the running stage loops.
pub struct StageSupervisor {
    cancel: CancellationToken,
    lock: Arc<ExclusiveLock>,
    handles: Vec<(StageKind, JoinHandle<()>)>,
}

impl StageSupervisor {
    /// Spawns one loop per stage on the current tokio runtime.
    pub fn start(ctx: WorkerContext, config: &WorkersConfig) -> Self {
        let cancel = CancellationToken::new();
        let handles = all_stages(&ctx)
            .into_iter()
            .map(|stage| {
                let kind = stage.kind();
                let schedule = Schedule::for_stage(kind, config);
                (kind, tokio::spawn(run_stage(stage, schedule, cancel.clone())))
            })
            .collect();

        log::info!("Started {} pipeline workers", StageKind::ALL.len());
        Self {
            cancel,
            lock: ctx.lock,
            handles,
        }
    }

    /// Token cancelled on shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|(_, h)| !h.is_finished())
    }

    /// Cancels every loop, fails all AI lock waiters and waits for the
    /// loops to exit. An in-flight AI session is left for the next start.
    pub async fn shutdown(self) {
        log::info!("Stopping pipeline workers");
        self.cancel.cancel();
        self.lock.stop();

        for (kind, handle) in self.handles {
            if let Err(e) = handle.await {
                log::error!("{} worker ended abnormally: {}", kind, e);
            }
        }
        log::info!("Pipeline workers stopped");
    }
}
