//! Stage workers: one polling loop per pipeline stage.
//!
//! Every stage scans the record store for the status it owns, processes the
//! matching records and writes the next status. Records are only ever
//! advanced by the stage matching their current status, so stages need no
//! locking between each other.

pub mod completion;
pub mod context;
pub mod filter;
pub mod report;
pub mod runner;
pub mod script;
pub mod semantic;
pub mod supervisor;
pub mod survey;
pub mod transcription;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::WorkersConfig;
use crate::pipeline::PipelineError;

pub use completion::CompletionStage;
pub use context::{Backends, Collaborators, WorkerContext};
pub use filter::FilterStage;
pub use report::ReportStage;
pub use runner::run_stage;
pub use script::ScriptStage;
pub use semantic::SemanticStage;
pub use supervisor::StageSupervisor;
pub use survey::SurveyStage;
pub use transcription::TranscriptionStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Survey,
    Script,
    Transcription,
    Semantic,
    Completion,
    Filter,
    Report,
}

impl StageKind {
    pub const ALL: [StageKind; 7] = [
        StageKind::Survey,
        StageKind::Script,
        StageKind::Transcription,
        StageKind::Semantic,
        StageKind::Completion,
        StageKind::Filter,
        StageKind::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Survey => "survey",
            StageKind::Script => "script",
            StageKind::Transcription => "transcription",
            StageKind::Semantic => "semantic",
            StageKind::Completion => "completion",
            StageKind::Filter => "filter",
            StageKind::Report => "report",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Records (or rows) looked at.
    pub scanned: usize,
    /// Records (or rows) moved forward.
    pub advanced: usize,
    pub failed: usize,
}

impl TickSummary {
    /// Counts the outcome of one item. Failures are logged here so a single
    /// failing record never aborts the rest of the tick.
    pub fn record(&mut self, stage: StageKind, id: &str, outcome: Result<bool, PipelineError>) {
        self.scanned += 1;
        match outcome {
            Ok(true) => self.advanced += 1,
            Ok(false) => {}
            Err(e) => {
                self.failed += 1;
                log::error!("[{}] {} failed: {}", stage, id, e);
            }
        }
    }
}

/// One pipeline stage.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Processes every record currently waiting for this stage.
    async fn tick(&self, cancel: &CancellationToken) -> Result<TickSummary, PipelineError>;
}

/// When a stage runs: once after `initial_delay`, then every `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl Schedule {
    pub fn for_stage(kind: StageKind, config: &WorkersConfig) -> Self {
        let interval = match kind {
            StageKind::Report => config.report_interval_secs,
            _ => config.interval_secs,
        };
        Self {
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            interval: Duration::from_secs(interval),
        }
    }
}
