//! Pipeline domain: the state machine, the stored documents and the
//! operations other components call.

pub mod analysis;
pub mod error;
pub mod messages;
pub mod record;
pub mod scoring;
pub mod service;
pub mod status;

pub use analysis::{PerQuestionAnalysis, RetryDecision, RetryPolicy};
pub use error::PipelineError;
pub use record::{
    InterviewScript, PipelineRecord, QuestionType, Report, ScriptQuestion, SurveyAnswer,
    VideoAnswer, VideoInterview, VideoStatus,
};
pub use scoring::FilterOutcome;
pub use service::PipelineService;
pub use status::PipelineStatus;
