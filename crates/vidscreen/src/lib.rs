pub mod ai;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod external;
pub mod llm;
pub mod lock;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod secrets;
pub mod worker;

pub use ai::{AiError, AiSession, AiSessionStore, AnalysisClient, AnalysisResult, HttpTransport};
pub use app::Vidscreen;
pub use config::{load_config, load_config_from_str, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, Result, VidscreenError};
pub use lock::ExclusiveLock;
pub use pipeline::{PipelineError, PipelineRecord, PipelineService, PipelineStatus};
pub use worker::{StageKind, StageSupervisor, WorkerContext};
