//! Per-question analysis repository: one row per (record, question),
//! updated in place on every attempt.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_timestamp, to_timestamp, Database, DatabaseError};
use crate::pipeline::PerQuestionAnalysis;

struct AnalysisRow {
    id: String,
    record_id: String,
    question_id: String,
    transcript: String,
    voice_file_id: Option<String>,
    frame_file_id: Option<String>,
    emotion_file_id: Option<String>,
    sentiment_file_id: Option<String>,
    error: String,
    retry_count: u32,
    last_attempt_at: String,
    manual_retry: bool,
    manual_skip: bool,
    escalated: bool,
    is_semantic_evaluated: bool,
    similarity: f64,
}

impl AnalysisRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            record_id: row.get("record_id")?,
            question_id: row.get("question_id")?,
            transcript: row.get("transcript")?,
            voice_file_id: row.get("voice_file_id")?,
            frame_file_id: row.get("frame_file_id")?,
            emotion_file_id: row.get("emotion_file_id")?,
            sentiment_file_id: row.get("sentiment_file_id")?,
            error: row.get("error")?,
            retry_count: row.get("retry_count")?,
            last_attempt_at: row.get("last_attempt_at")?,
            manual_retry: row.get("manual_retry")?,
            manual_skip: row.get("manual_skip")?,
            escalated: row.get("escalated")?,
            is_semantic_evaluated: row.get("is_semantic_evaluated")?,
            similarity: row.get("similarity")?,
        })
    }

    fn into_analysis(self) -> Result<PerQuestionAnalysis, DatabaseError> {
        Ok(PerQuestionAnalysis {
            last_attempt_at: parse_timestamp("last_attempt_at", &self.last_attempt_at)?,
            id: self.id,
            record_id: self.record_id,
            question_id: self.question_id,
            transcript: self.transcript,
            voice_file_id: self.voice_file_id,
            frame_file_id: self.frame_file_id,
            emotion_file_id: self.emotion_file_id,
            sentiment_file_id: self.sentiment_file_id,
            error: self.error,
            retry_count: self.retry_count,
            manual_retry: self.manual_retry,
            manual_skip: self.manual_skip,
            escalated: self.escalated,
            is_semantic_evaluated: self.is_semantic_evaluated,
            similarity: self.similarity,
        })
    }
}

fn collect(rows: Vec<AnalysisRow>) -> Result<Vec<PerQuestionAnalysis>, DatabaseError> {
    rows.into_iter().map(AnalysisRow::into_analysis).collect()
}

/// Inserts the row, or overwrites the existing row of the same
/// (record, question). The stored id of an existing row is kept.
pub fn upsert_in(conn: &Connection, analysis: &PerQuestionAnalysis) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO question_analyses (id, record_id, question_id, transcript, voice_file_id,
         frame_file_id, emotion_file_id, sentiment_file_id, error, retry_count, last_attempt_at,
         manual_retry, manual_skip, escalated, is_semantic_evaluated, similarity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT (record_id, question_id) DO UPDATE SET
            transcript = excluded.transcript,
            voice_file_id = excluded.voice_file_id,
            frame_file_id = excluded.frame_file_id,
            emotion_file_id = excluded.emotion_file_id,
            sentiment_file_id = excluded.sentiment_file_id,
            error = excluded.error,
            retry_count = excluded.retry_count,
            last_attempt_at = excluded.last_attempt_at,
            manual_retry = excluded.manual_retry,
            manual_skip = excluded.manual_skip,
            escalated = excluded.escalated,
            is_semantic_evaluated = excluded.is_semantic_evaluated,
            similarity = excluded.similarity",
        params![
            analysis.id,
            analysis.record_id,
            analysis.question_id,
            analysis.transcript,
            analysis.voice_file_id,
            analysis.frame_file_id,
            analysis.emotion_file_id,
            analysis.sentiment_file_id,
            analysis.error,
            analysis.retry_count,
            to_timestamp(&analysis.last_attempt_at),
            analysis.manual_retry,
            analysis.manual_skip,
            analysis.escalated,
            analysis.is_semantic_evaluated,
            analysis.similarity,
        ],
    )?;
    Ok(())
}

pub fn upsert(db: &Database, analysis: &PerQuestionAnalysis) -> Result<(), DatabaseError> {
    db.with_conn(|conn| upsert_in(conn, analysis))
}

/// Stores the outcome of an analysis attempt: transcript, artifacts, error,
/// retry counter and attempt time. Operator flags and the semantic score of
/// an existing row are left as they are, so a retry or skip requested while
/// the attempt ran survives it.
pub fn save_attempt_in(
    conn: &Connection,
    analysis: &PerQuestionAnalysis,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO question_analyses (id, record_id, question_id, transcript, voice_file_id,
         frame_file_id, emotion_file_id, sentiment_file_id, error, retry_count, last_attempt_at,
         manual_retry, manual_skip, escalated, is_semantic_evaluated, similarity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 0, 0, 0, 0)
         ON CONFLICT (record_id, question_id) DO UPDATE SET
            transcript = excluded.transcript,
            voice_file_id = excluded.voice_file_id,
            frame_file_id = excluded.frame_file_id,
            emotion_file_id = excluded.emotion_file_id,
            sentiment_file_id = excluded.sentiment_file_id,
            error = excluded.error,
            retry_count = excluded.retry_count,
            last_attempt_at = excluded.last_attempt_at,
            escalated = 0",
        params![
            analysis.id,
            analysis.record_id,
            analysis.question_id,
            analysis.transcript,
            analysis.voice_file_id,
            analysis.frame_file_id,
            analysis.emotion_file_id,
            analysis.sentiment_file_id,
            analysis.error,
            analysis.retry_count,
            to_timestamp(&analysis.last_attempt_at),
        ],
    )?;
    Ok(())
}

pub fn save_attempt(db: &Database, analysis: &PerQuestionAnalysis) -> Result<(), DatabaseError> {
    db.with_conn(|conn| save_attempt_in(conn, analysis))
}

pub fn find(
    db: &Database,
    record_id: &str,
    question_id: &str,
) -> Result<Option<PerQuestionAnalysis>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM question_analyses WHERE record_id = ?1 AND question_id = ?2",
            params![record_id, question_id],
            AnalysisRow::from_row,
        )
        .optional()?
        .map(AnalysisRow::into_analysis)
        .transpose()
    })
}

/// All rows of a record.
pub fn list_by_record(
    db: &Database,
    record_id: &str,
) -> Result<Vec<PerQuestionAnalysis>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM question_analyses WHERE record_id = ?1 ORDER BY question_id",
        )?;
        let rows = stmt
            .query_map(params![record_id], AnalysisRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        collect(rows)
    })
}

/// Rows of a record that still await semantic scoring.
pub fn list_unscored(
    db: &Database,
    record_id: &str,
) -> Result<Vec<PerQuestionAnalysis>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM question_analyses
             WHERE record_id = ?1 AND is_semantic_evaluated = 0
             ORDER BY question_id",
        )?;
        let rows = stmt
            .query_map(params![record_id], AnalysisRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        collect(rows)
    })
}

pub fn count_semantic_evaluated(db: &Database, record_id: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM question_analyses
             WHERE record_id = ?1 AND is_semantic_evaluated = 1",
            params![record_id],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    })
}

/// Stores a semantic score and marks the row evaluated.
pub fn save_similarity(db: &Database, id: &str, similarity: f64) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE question_analyses SET similarity = ?2, is_semantic_evaluated = 1 WHERE id = ?1",
            params![id, similarity],
        )?;
        Ok(())
    })
}

/// Flags a row for an operator-requested retry. Returns false when the row
/// does not exist.
pub fn set_manual_retry(
    db: &Database,
    record_id: &str,
    question_id: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE question_analyses SET manual_retry = 1, manual_skip = 0, escalated = 0
             WHERE record_id = ?1 AND question_id = ?2",
            params![record_id, question_id],
        )?;
        Ok(changed > 0)
    })
}

/// Flags a row as skipped by an operator. Returns false when the row does
/// not exist.
pub fn set_manual_skip(
    db: &Database,
    record_id: &str,
    question_id: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE question_analyses SET manual_skip = 1, manual_retry = 0
             WHERE record_id = ?1 AND question_id = ?2",
            params![record_id, question_id],
        )?;
        Ok(changed > 0)
    })
}

/// Consumes an operator-requested retry when the attempt starts.
pub fn clear_manual_retry(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE question_analyses SET manual_retry = 0 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    })
}

pub fn mark_escalated(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE question_analyses SET escalated = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    })
}
