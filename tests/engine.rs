//! Integration tests for the job engine.
//!
//! Each test starts a real engine (supervisor task, worker pool, flag
//! store under a tempdir) and exercises the submit / wait / take_result
//! contract end to end.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value, json};
use tempfile::TempDir;
use tokio::time::timeout;

use jobpool::config::EngineConfig;
use jobpool::error::{Error, ResultError};
use jobpool::job::{Job, JobHooks, JobOutcome, TargetResult};
use jobpool::manager::JobManager;

/// Maximum time any wait in these tests is allowed to block.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn square(args: &[Value], _kwargs: &Map<String, Value>) -> TargetResult {
    let x = args[0].as_i64().unwrap_or(0);
    Ok(json!(x * x))
}

fn boom(_args: &[Value], _kwargs: &Map<String, Value>) -> TargetResult {
    Err("boom".into())
}

fn config(dir: &TempDir, name: &str) -> EngineConfig {
    EngineConfig {
        supervisor_name: name.to_string(),
        pool_size: 4,
        flag_root: Some(dir.path().to_path_buf()),
        flag_check_interval: Duration::from_millis(50),
        ..EngineConfig::default()
    }
}

fn square_job(i: i64) -> Job {
    Job::new(
        format!("square {i}"),
        format!("{i}"),
        Arc::new(square),
        vec![json!(i)],
        Map::new(),
    )
}

/// Ten independent squares, one wait, one retrieval per key, and
/// retrieval is strictly one-shot.
#[tokio::test]
async fn batch_of_squares_round_trip() {
    let dir = TempDir::new().unwrap();
    let manager = JobManager::start(config(&dir, "it-squares")).await.unwrap();

    for i in 0..10 {
        let key = manager.submit(square_job(i)).unwrap();
        assert_eq!(key.as_str(), format!("{i}"));
    }

    timeout(TEST_TIMEOUT, manager.wait()).await.unwrap();

    for i in 0..10i64 {
        let outcome = manager.take_result(format!("{i}")).await.unwrap();
        assert_eq!(outcome.value(), Some(&json!(i * i)), "wrong square for {i}");

        let err = manager.take_result(format!("{i}")).await.unwrap_err();
        assert!(matches!(err, Error::Result(ResultError::NotFound { .. })));
    }

    manager.shutdown().await.unwrap();
}

/// A faulting target is captured as an outcome and leaves the rest of
/// the batch untouched.
#[tokio::test]
async fn fault_is_captured_and_isolated() {
    let dir = TempDir::new().unwrap();
    let manager = JobManager::start(config(&dir, "it-fault")).await.unwrap();

    manager
        .submit(Job::new("boom", "bad", Arc::new(boom), vec![], Map::new()))
        .unwrap();
    for i in 0..5 {
        manager.submit(square_job(i)).unwrap();
    }

    timeout(TEST_TIMEOUT, manager.wait()).await.unwrap();

    let outcome = manager.take_result("bad").await.unwrap();
    assert!(outcome.is_fault());
    assert_eq!(outcome.fault_message(), Some("boom"));

    for i in 0..5i64 {
        let outcome = manager.take_result(format!("{i}")).await.unwrap();
        assert_eq!(outcome.value(), Some(&json!(i * i)));
    }

    manager.shutdown().await.unwrap();
}

/// Completion hooks fire exactly once per job, for both outcomes.
#[tokio::test]
async fn hooks_fire_once_per_job() {
    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
    }

    impl JobHooks for Recording {
        fn on_success(&self, job_name: &str, _value: &Value) {
            self.events.lock().unwrap().push(format!("ok {job_name}"));
        }
        fn on_error(&self, job_name: &str, message: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("err {job_name}: {message}"));
        }
    }

    let dir = TempDir::new().unwrap();
    let manager = JobManager::start(config(&dir, "it-hooks")).await.unwrap();
    let hooks = Arc::new(Recording::default());

    manager
        .submit(
            Job::new("good", "g", Arc::new(square), vec![json!(3)], Map::new())
                .with_hooks(Arc::clone(&hooks) as Arc<dyn JobHooks>),
        )
        .unwrap();
    manager
        .submit(
            Job::new("bad", "b", Arc::new(boom), vec![], Map::new())
                .with_hooks(Arc::clone(&hooks) as Arc<dyn JobHooks>),
        )
        .unwrap();

    timeout(TEST_TIMEOUT, manager.wait()).await.unwrap();

    let mut events = hooks.events.lock().unwrap().clone();
    events.sort();
    assert_eq!(events, ["err bad: boom", "ok good"]);

    manager.shutdown().await.unwrap();
}

/// Shutdown lets a job that is already running finish and publish its
/// outcome.
#[tokio::test]
async fn shutdown_waits_for_resident_workers() {
    struct SlowTouch {
        marker: PathBuf,
    }

    impl jobpool::job::JobTarget for SlowTouch {
        fn run(&self, _args: &[Value], _kwargs: &Map<String, Value>) -> TargetResult {
            std::fs::write(&self.marker, b"")?;
            std::thread::sleep(Duration::from_millis(300));
            Ok(json!("done"))
        }
    }

    let dir = TempDir::new().unwrap();
    let manager = JobManager::start(config(&dir, "it-resident")).await.unwrap();

    let marker = dir.path().join("job-running");
    manager
        .submit(Job::new(
            "slow",
            "slow",
            Arc::new(SlowTouch {
                marker: marker.clone(),
            }),
            vec![],
            Map::new(),
        ))
        .unwrap();

    // Only shut down once the job is demonstrably running on a worker.
    timeout(TEST_TIMEOUT, async {
        while !marker.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    timeout(TEST_TIMEOUT, manager.shutdown()).await.unwrap().unwrap();

    let outcome = manager.take_result("slow").await.unwrap();
    assert_eq!(outcome.value(), Some(&json!("done")));
}

/// Two `shared` lookups under one name return the same engine; work
/// submitted through one handle is visible through the other.
#[tokio::test]
async fn shared_engine_is_a_singleton() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir, "it-shared");

    let first = JobManager::shared(cfg.clone()).await.unwrap();
    let second = JobManager::shared(cfg).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    first.submit(square_job(7)).unwrap();
    timeout(TEST_TIMEOUT, second.wait()).await.unwrap();
    assert_eq!(
        second.take_result("7").await.unwrap().value(),
        Some(&json!(49))
    );

    first.shutdown().await.unwrap();
}

/// Outcomes survive serialization with their status tag, so callers that
/// persist them can branch without re-inspecting value shapes.
#[tokio::test]
async fn outcomes_serialize_with_status_tag() {
    let dir = TempDir::new().unwrap();
    let manager = JobManager::start(config(&dir, "it-serde")).await.unwrap();

    manager.submit(square_job(5)).unwrap();
    manager
        .submit(Job::new("boom", "bad", Arc::new(boom), vec![], Map::new()))
        .unwrap();
    timeout(TEST_TIMEOUT, manager.wait()).await.unwrap();

    let ok: JobOutcome = manager.take_result("5").await.unwrap();
    let ok_json = serde_json::to_value(&ok).unwrap();
    assert_eq!(ok_json["status"], "success");
    assert_eq!(ok_json["value"], 25);

    let bad: JobOutcome = manager.take_result("bad").await.unwrap();
    let bad_json = serde_json::to_value(&bad).unwrap();
    assert_eq!(bad_json["status"], "fault");
    assert_eq!(bad_json["message"], "boom");

    manager.shutdown().await.unwrap();
}
