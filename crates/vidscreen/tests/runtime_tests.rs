//! AI lock under contention, session durability across restarts and the
//! stage supervisor.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::TestHarness;
use vidscreen::ai::{AiSession, AiSessionStore};
use vidscreen::db::Database;
use vidscreen::lock::ExclusiveLock;
use vidscreen::pipeline::PipelineStatus;
use vidscreen::worker::StageSupervisor;
use vidscreen::{load_config_from_str, Vidscreen};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lock_admits_one_holder_at_a_time() {
    let lock = Arc::new(ExclusiveLock::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for i in 0..8 {
        let lock = Arc::clone(&lock);
        let inside = Arc::clone(&inside);
        let max_inside = Arc::clone(&max_inside);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                let owner = format!("worker-{}", i);
                let guard = lock.lock(&cancel, &owner).await.expect("lock acquired");
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                drop(guard);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(lock.holder(), None);
}

#[tokio::test]
async fn test_stop_fails_waiters() {
    let lock = Arc::new(ExclusiveLock::new());
    let cancel = CancellationToken::new();
    assert!(lock.acquire(&cancel, "first").await);

    let waiter = {
        let lock = Arc::clone(&lock);
        let cancel = cancel.clone();
        tokio::spawn(async move { lock.acquire(&cancel, "second").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    lock.stop();

    let acquired = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter woke up")
        .unwrap();
    assert!(!acquired);
    assert!(!lock.acquire(&cancel, "third").await);
}

#[test]
fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("vidscreen.db");

    let mut session = AiSession::new("record-1", "q1", "a1");
    session.video_path = Some("/tmp/gradio/v.mp4".into());
    {
        let store = AiSessionStore::new(Database::open(&path).unwrap());
        store.save(&session).unwrap();
    }

    let store = AiSessionStore::new(Database::open(&path).unwrap());
    let sessions = store.get_all().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, session.id);
    assert_eq!(sessions[0].video_path.as_deref(), Some("/tmp/gradio/v.mp4"));

    let err = store
        .save(&AiSession::new("record-2", "q1", "a2"))
        .unwrap_err();
    assert!(err.to_string().contains("unfinished request exists"));

    session.event_id = Some("event-9".into());
    assert_eq!(store.save(&session).unwrap(), session.id);
    assert!(store.delete(&session.id).unwrap());
    assert!(store.get_all().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_supervisor_runs_stages_until_shutdown() {
    let h = TestHarness::new();
    let record = h.seed_record("a1", PipelineStatus::NotSent, &[]);

    let supervisor = StageSupervisor::start(h.ctx.clone(), &h.config.workers);
    assert!(supervisor.is_running());

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(h.record(&record.id).status, PipelineStatus::Sent);

    let token = supervisor.cancellation_token();
    supervisor.shutdown().await;
    assert!(token.is_cancelled());
    assert!(h.ctx.lock.is_stopped());
}

#[tokio::test]
async fn test_app_opens_configured_database_and_shuts_down() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("app").join("vidscreen.db");
    let h = TestHarness::new();

    let mut config = load_config_from_str(common::harness::BASE_CONFIG).unwrap();
    config.database.path = Some(db_path.clone());

    let app = Vidscreen::start(&config, h.collaborators()).unwrap();
    let record = app.service().create_record("space-1", "a1", "vacancy-1").unwrap();
    assert_eq!(record.status, PipelineStatus::NotSent);
    app.shutdown().await;

    assert!(db_path.exists());
    let reopened = Vidscreen::open_database(&config.database).unwrap();
    let found = vidscreen::db::record_repo::find_by_id(&reopened, &record.id).unwrap();
    assert!(found.is_some());
}
