//! AI session repository. The table holds at most one row (`slot = 1`).

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_timestamp, to_timestamp, Database, DatabaseError};
use crate::ai::AiSession;

struct SessionRow {
    id: String,
    record_id: String,
    question_id: String,
    applicant_id: String,
    video_path: Option<String>,
    event_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            record_id: row.get("record_id")?,
            question_id: row.get("question_id")?,
            applicant_id: row.get("applicant_id")?,
            video_path: row.get("video_path")?,
            event_id: row.get("event_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_session(self) -> Result<AiSession, DatabaseError> {
        Ok(AiSession {
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            id: self.id,
            record_id: self.record_id,
            question_id: self.question_id,
            applicant_id: self.applicant_id,
            video_path: self.video_path,
            event_id: self.event_id,
        })
    }
}

fn current(conn: &Connection) -> Result<Option<AiSession>, DatabaseError> {
    conn.query_row("SELECT * FROM ai_sessions WHERE slot = 1", [], SessionRow::from_row)
        .optional()?
        .map(SessionRow::into_session)
        .transpose()
}

/// Stores `session` and returns the id of the stored row.
///
/// Saving for the (record, question) pair already stored updates that row
/// in place. Saving for any other pair while a row exists fails with
/// [`DatabaseError::UnfinishedRequest`] and leaves the stored row untouched.
pub fn save(db: &Database, session: &AiSession) -> Result<String, DatabaseError> {
    db.with_transaction(|tx| {
        let now = to_timestamp(&Utc::now());
        match current(tx)? {
            Some(existing) => {
                if existing.record_id != session.record_id
                    || existing.question_id != session.question_id
                {
                    return Err(DatabaseError::UnfinishedRequest {
                        record_id: existing.record_id,
                        question_id: existing.question_id,
                    });
                }
                tx.execute(
                    "UPDATE ai_sessions SET applicant_id = ?1, video_path = ?2, event_id = ?3,
                     updated_at = ?4 WHERE slot = 1",
                    params![session.applicant_id, session.video_path, session.event_id, now],
                )?;
                Ok(existing.id)
            }
            None => {
                tx.execute(
                    "INSERT INTO ai_sessions (slot, id, record_id, question_id, applicant_id,
                     video_path, event_id, created_at, updated_at)
                     VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    params![
                        session.id,
                        session.record_id,
                        session.question_id,
                        session.applicant_id,
                        session.video_path,
                        session.event_id,
                        now,
                    ],
                )?;
                Ok(session.id.clone())
            }
        }
    })
}

/// Every stored session. There is never more than one.
pub fn get_all(db: &Database) -> Result<Vec<AiSession>, DatabaseError> {
    db.with_conn(|conn| Ok(current(conn)?.into_iter().collect()))
}

/// The stored session when it belongs to (record, question).
pub fn find_for(
    db: &Database,
    record_id: &str,
    question_id: &str,
) -> Result<Option<AiSession>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(current(conn)?
            .filter(|s| s.record_id == record_id && s.question_id == question_id))
    })
}

/// Deletes the session with `id`. Returns whether a row was removed.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM ai_sessions WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}
