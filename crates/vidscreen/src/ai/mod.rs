//! AI backend integration: the session store, the transport and the
//! adapter that ties them together.

pub mod client;
pub mod error;
pub mod result;
pub mod session;
pub mod sse;
pub mod transport;

pub use client::{AnalysisClient, AnalysisTarget, VideoSource};
pub use error::AiError;
pub use result::{AnalysisResult, ArtifactKind, ArtifactRef};
pub use session::{AiSession, AiSessionStore};
pub use transport::{AnalysisTransport, HttpTransport};
