//! Pipeline record repository: CRUD and guarded status writes for the
//! `pipeline_records` table.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{parse_timestamp, to_timestamp, Database, DatabaseError};
use crate::pipeline::{PipelineRecord, PipelineStatus};

/// A raw record row from the database.
struct RecordRow {
    id: String,
    space_id: String,
    applicant_id: String,
    vacancy_id: String,
    status: String,
    survey_answers: String,
    script: Option<String>,
    video_interview: String,
    total_score: Option<f64>,
    threshold: f64,
    pass: Option<bool>,
    report: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            space_id: row.get("space_id")?,
            applicant_id: row.get("applicant_id")?,
            vacancy_id: row.get("vacancy_id")?,
            status: row.get("status")?,
            survey_answers: row.get("survey_answers")?,
            script: row.get("script")?,
            video_interview: row.get("video_interview")?,
            total_score: row.get("total_score")?,
            threshold: row.get("threshold")?,
            pass: row.get("pass")?,
            report: row.get("report")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<PipelineRecord, DatabaseError> {
        let status = self
            .status
            .parse::<PipelineStatus>()
            .map_err(|_| DatabaseError::InvalidValue {
                column: "status",
                value: self.status.clone(),
            })?;

        Ok(PipelineRecord {
            id: self.id,
            space_id: self.space_id,
            applicant_id: self.applicant_id,
            vacancy_id: self.vacancy_id,
            status,
            survey_answers: decode("survey_answers", &self.survey_answers)?,
            script: self
                .script
                .as_deref()
                .map(|s| decode("script", s))
                .transpose()?,
            video_interview: decode("video_interview", &self.video_interview)?,
            total_score: self.total_score,
            threshold: self.threshold,
            pass: self.pass,
            report: self
                .report
                .as_deref()
                .map(|s| decode("report", s))
                .transpose()?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

fn decode<T: DeserializeOwned>(column: &'static str, s: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(s).map_err(|source| DatabaseError::Json { column, source })
}

fn encode<T: Serialize>(column: &'static str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|source| DatabaseError::Json { column, source })
}

fn encode_opt<T: Serialize>(
    column: &'static str,
    value: &Option<T>,
) -> Result<Option<String>, DatabaseError> {
    value.as_ref().map(|v| encode(column, v)).transpose()
}

/// Inserts a new record row.
pub fn insert(db: &Database, record: &PipelineRecord) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO pipeline_records (id, space_id, applicant_id, vacancy_id, status,
             survey_answers, script, video_interview, total_score, threshold, pass, report,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.id,
                record.space_id,
                record.applicant_id,
                record.vacancy_id,
                record.status.as_str(),
                encode("survey_answers", &record.survey_answers)?,
                encode_opt("script", &record.script)?,
                encode("video_interview", &record.video_interview)?,
                record.total_score,
                record.threshold,
                record.pass,
                encode_opt("report", &record.report)?,
                to_timestamp(&record.created_at),
                to_timestamp(&record.updated_at),
            ],
        )?;
        Ok(())
    })
}

/// Finds a record by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<PipelineRecord>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM pipeline_records WHERE id = ?1",
            params![id],
            RecordRow::from_row,
        )
        .optional()?
        .map(RecordRow::into_record)
        .transpose()
    })
}

/// Finds the record of an applicant.
pub fn find_by_applicant(
    db: &Database,
    space_id: &str,
    applicant_id: &str,
) -> Result<Option<PipelineRecord>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM pipeline_records WHERE space_id = ?1 AND applicant_id = ?2",
            params![space_id, applicant_id],
            RecordRow::from_row,
        )
        .optional()?
        .map(RecordRow::into_record)
        .transpose()
    })
}

/// Lists every record currently in `status`, oldest first.
pub fn list_by_status(
    db: &Database,
    status: PipelineStatus,
) -> Result<Vec<PipelineRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM pipeline_records WHERE status = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![status.as_str()], RecordRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RecordRow::into_record).collect()
    })
}

/// Counts records in `status`.
pub fn count_by_status(db: &Database, status: PipelineStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pipeline_records WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    })
}

/// Overwrites every data column of a record. The status column is left
/// untouched; it only changes through [`transition_in`].
pub fn update_data_in(conn: &Connection, record: &PipelineRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE pipeline_records SET survey_answers=?2, script=?3, video_interview=?4,
         total_score=?5, threshold=?6, pass=?7, report=?8, updated_at=?9
         WHERE id=?1",
        params![
            record.id,
            encode("survey_answers", &record.survey_answers)?,
            encode_opt("script", &record.script)?,
            encode("video_interview", &record.video_interview)?,
            record.total_score,
            record.threshold,
            record.pass,
            encode_opt("report", &record.report)?,
            to_timestamp(&Utc::now()),
        ],
    )?;
    Ok(())
}

pub fn update_data(db: &Database, record: &PipelineRecord) -> Result<(), DatabaseError> {
    db.with_conn(|conn| update_data_in(conn, record))
}

/// Moves a record from `from` to `to`.
///
/// Fails with `InvalidTransition` when `to` is not a successor of `from`,
/// and with `StatusConflict` when the stored status is no longer `from`.
pub fn transition_in(
    conn: &Connection,
    id: &str,
    from: PipelineStatus,
    to: PipelineStatus,
) -> Result<(), DatabaseError> {
    if !from.can_transition_to(to) {
        return Err(DatabaseError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    let changed = conn.execute(
        "UPDATE pipeline_records SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id, from.as_str(), to.as_str(), to_timestamp(&Utc::now())],
    )?;
    if changed == 0 {
        return Err(DatabaseError::StatusConflict {
            id: id.to_string(),
            expected: from.to_string(),
        });
    }
    Ok(())
}

pub fn transition(
    db: &Database,
    id: &str,
    from: PipelineStatus,
    to: PipelineStatus,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| transition_in(conn, id, from, to))
}

/// Persists the record's data and moves it from `from` to `record.status`
/// in one transaction.
pub fn save_with_transition(
    db: &Database,
    record: &PipelineRecord,
    from: PipelineStatus,
) -> Result<(), DatabaseError> {
    db.with_transaction(|tx| {
        update_data_in(tx, record)?;
        transition_in(tx, &record.id, from, record.status)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{InterviewScript, ScriptQuestion, SurveyAnswer, VideoStatus};

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_record(applicant: &str) -> PipelineRecord {
        PipelineRecord::new("space-1", applicant, "vacancy-1", 60.0)
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let mut record = sample_record("a1");
        record.survey_answers.push(SurveyAnswer {
            question_id: "relocate".into(),
            answer: "yes".into(),
        });
        insert(&db, &record).unwrap();

        let found = find_by_id(&db, &record.id).unwrap().unwrap();
        assert_eq!(found.applicant_id, "a1");
        assert_eq!(found.status, PipelineStatus::NotSent);
        assert_eq!(found.survey_answers, record.survey_answers);
        assert_eq!(found.video_interview.status, VideoStatus::Absent);
        assert!(found.script.is_none());

        let by_applicant = find_by_applicant(&db, "space-1", "a1").unwrap().unwrap();
        assert_eq!(by_applicant.id, record.id);
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "missing").unwrap().is_none());
        assert!(find_by_applicant(&db, "space-1", "nobody").unwrap().is_none());
    }

    #[test]
    fn test_one_record_per_applicant() {
        let db = test_db();
        insert(&db, &sample_record("a1")).unwrap();
        assert!(insert(&db, &sample_record("a1")).is_err());
    }

    #[test]
    fn test_list_and_count_by_status() {
        let db = test_db();
        insert(&db, &sample_record("a1")).unwrap();
        insert(&db, &sample_record("a2")).unwrap();
        let mut sent = sample_record("a3");
        sent.status = PipelineStatus::Sent;
        insert(&db, &sent).unwrap();

        assert_eq!(list_by_status(&db, PipelineStatus::NotSent).unwrap().len(), 2);
        assert_eq!(count_by_status(&db, PipelineStatus::Sent).unwrap(), 1);
        assert_eq!(count_by_status(&db, PipelineStatus::Report).unwrap(), 0);
    }

    #[test]
    fn test_transition_follows_graph() {
        let db = test_db();
        let record = sample_record("a1");
        insert(&db, &record).unwrap();

        transition(&db, &record.id, PipelineStatus::NotSent, PipelineStatus::Sent).unwrap();
        let err = transition(&db, &record.id, PipelineStatus::Sent, PipelineStatus::Done)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidTransition { .. }));

        let found = find_by_id(&db, &record.id).unwrap().unwrap();
        assert_eq!(found.status, PipelineStatus::Sent);
    }

    #[test]
    fn test_transition_from_stale_status_conflicts() {
        let db = test_db();
        let record = sample_record("a1");
        insert(&db, &record).unwrap();
        transition(&db, &record.id, PipelineStatus::NotSent, PipelineStatus::Sent).unwrap();

        let err = transition(&db, &record.id, PipelineStatus::NotSent, PipelineStatus::Sent)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::StatusConflict { .. }));
    }

    #[test]
    fn test_save_with_transition_is_atomic() {
        let db = test_db();
        let mut record = sample_record("a1");
        record.status = PipelineStatus::Done;
        insert(&db, &record).unwrap();

        record.script = Some(InterviewScript {
            intro: "hi".into(),
            outro: "bye".into(),
            comment: String::new(),
            questions: vec![ScriptQuestion {
                id: "q1".into(),
                text: "Why us?".into(),
                kind: Default::default(),
                options: vec![],
                expected_answer: "motivation".into(),
            }],
        });

        // Not an edge: nothing must be written.
        record.status = PipelineStatus::Filtered;
        assert!(save_with_transition(&db, &record, PipelineStatus::Done).is_err());
        let found = find_by_id(&db, &record.id).unwrap().unwrap();
        assert!(found.script.is_none());
        assert_eq!(found.status, PipelineStatus::Done);

        record.status = PipelineStatus::Draft;
        save_with_transition(&db, &record, PipelineStatus::Done).unwrap();
        let found = find_by_id(&db, &record.id).unwrap().unwrap();
        assert_eq!(found.status, PipelineStatus::Draft);
        assert_eq!(found.question_count(), 1);
    }

    #[test]
    fn test_update_data_keeps_status() {
        let db = test_db();
        let mut record = sample_record("a1");
        insert(&db, &record).unwrap();

        record.status = PipelineStatus::Report;
        record.total_score = Some(42.0);
        record.pass = Some(false);
        update_data(&db, &record).unwrap();

        let found = find_by_id(&db, &record.id).unwrap().unwrap();
        assert_eq!(found.status, PipelineStatus::NotSent);
        assert_eq!(found.total_score, Some(42.0));
        assert_eq!(found.pass, Some(false));
    }
}
