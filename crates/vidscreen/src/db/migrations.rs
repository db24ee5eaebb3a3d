//! Schema migrations, recorded by version in `_migrations`.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_pipeline_records_table",
        sql: include_str!("sql/001_create_pipeline_records.sql"),
    },
    Migration {
        version: 2,
        description: "create_question_analyses_table",
        sql: include_str!("sql/002_create_question_analyses.sql"),
    },
    Migration {
        version: 3,
        description: "create_ai_sessions_table",
        sql: include_str!("sql/003_create_ai_sessions.sql"),
    },
];

/// Applies every migration newer than the highest recorded version. Each
/// migration and its bookkeeping row commit together.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(conn, migration)?;
    }
    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let failed = |e: rusqlite::Error| DatabaseError::Migration {
        version: migration.version,
        reason: e.to_string(),
    };

    log::info!("Applying migration v{} ({})", migration.version, migration.description);
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql).map_err(failed)?;
    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.description],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = fresh();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = fresh();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_question_analyses_created_with_escalated() {
        let conn = fresh();
        run_all(&conn).unwrap();

        let columns: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('question_analyses')")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(columns.iter().any(|c| c == "escalated"));

        let versions: Vec<u32> = conn
            .prepare("SELECT version FROM _migrations ORDER BY version")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_ai_sessions_admit_a_single_row() {
        let conn = fresh();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO ai_sessions (slot, id, record_id, question_id, applicant_id, created_at, updated_at)
             VALUES (1, 's1', 'r1', 'q1', 'a1', 'x', 'x')",
            [],
        )
        .unwrap();
        let second = conn.execute(
            "INSERT INTO ai_sessions (slot, id, record_id, question_id, applicant_id, created_at, updated_at)
             VALUES (2, 's2', 'r2', 'q2', 'a2', 'x', 'x')",
            [],
        );
        assert!(second.is_err());
    }
}
