//! Durable record of the one in-flight AI job.

use chrono::{DateTime, Utc};

use crate::db::{session_repo, Database, DatabaseError};

/// The in-flight AI job: the uploaded file handle and the remote event id.
/// Both are filled in as the adapter progresses so a restart can resume.
#[derive(Debug, Clone, PartialEq)]
pub struct AiSession {
    pub id: String,
    pub record_id: String,
    pub question_id: String,
    pub applicant_id: String,
    pub video_path: Option<String>,
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AiSession {
    pub fn new(record_id: &str, question_id: &str, applicant_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            record_id: record_id.to_string(),
            question_id: question_id.to_string(),
            applicant_id: applicant_id.to_string(),
            video_path: None,
            event_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Store enforcing that at most one session exists.
#[derive(Clone)]
pub struct AiSessionStore {
    db: Database,
}

impl AiSessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Saves the session and returns the stored id. Fails with
    /// "unfinished request exists" while a session of another
    /// (record, question) pair is stored.
    pub fn save(&self, session: &AiSession) -> Result<String, DatabaseError> {
        session_repo::save(&self.db, session)
    }

    pub fn get_all(&self) -> Result<Vec<AiSession>, DatabaseError> {
        session_repo::get_all(&self.db)
    }

    pub fn find_for(
        &self,
        record_id: &str,
        question_id: &str,
    ) -> Result<Option<AiSession>, DatabaseError> {
        session_repo::find_for(&self.db, record_id, question_id)
    }

    pub fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        session_repo::delete(&self.db, id)
    }
}
