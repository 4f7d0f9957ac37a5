//! Queue durability and restart-recovery tests

use spool_server::queue::{JobState, PrintQueue, SourceKind};

fn enqueue_named(queue: &PrintQueue, name: &str) -> uuid::Uuid {
    queue
        .enqueue(SourceKind::Image, "127.0.0.1", name, format!("/tmp/{name}"))
        .unwrap()
}

#[test]
fn pending_jobs_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let queue = PrintQueue::open(dir.path()).unwrap();
        enqueue_named(&queue, "invoice.pdf")
    };

    // Reopen from disk, as after a process restart
    let queue = PrintQueue::open(dir.path()).unwrap();
    let snapshot = queue.snapshot();

    assert_eq!(snapshot.pending_count, 1);
    assert_eq!(snapshot.pending[0].id, id);
    assert_eq!(snapshot.pending[0].original_filename, "invoice.pdf");
    assert_eq!(snapshot.pending[0].state, JobState::Pending);
}

#[test]
fn interrupted_job_is_reset_to_error_not_resumed() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let queue = PrintQueue::open(dir.path()).unwrap();
        let id = enqueue_named(&queue, "receipt.png");
        // Claim but never complete: simulates a crash mid-print
        let job = queue.claim_next().unwrap().unwrap();
        assert_eq!(job.id, id);
        id
    };

    let queue = PrintQueue::open(dir.path()).unwrap();
    let snapshot = queue.snapshot();

    // Never resumed, never dropped
    assert_eq!(snapshot.pending_count, 0);
    let recovered = snapshot
        .recent_completed
        .iter()
        .find(|j| j.id == id)
        .expect("interrupted job present in recent completed");
    assert_eq!(recovered.state, JobState::Error);
    assert!(
        recovered
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("interrupted")
    );

    // And the reset itself is durable
    let queue = PrintQueue::open(dir.path()).unwrap();
    assert_eq!(queue.snapshot().recent_completed[0].state, JobState::Error);
}

#[test]
fn recent_cache_cap_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let queue = PrintQueue::open(dir.path()).unwrap();
        for i in 0..11 {
            enqueue_named(&queue, &format!("job{i}.png"));
        }
        for _ in 0..11 {
            let job = queue.claim_next().unwrap().unwrap();
            queue.mark_printed(job.id).unwrap();
        }
    }

    let queue = PrintQueue::open(dir.path()).unwrap();
    let snapshot = queue.snapshot();
    assert_eq!(snapshot.recent_completed.len(), 10);
    assert!(
        snapshot
            .recent_completed
            .iter()
            .all(|j| j.state == JobState::Printed)
    );
}

#[test]
fn unknown_fields_in_persisted_state_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let state = serde_json::json!({
        "format_version": 7,
        "pending": [{
            "id": "7f1c6f2e-58a5-4a7d-9d10-3f54ad29c2bb",
            "kind": "image",
            "origin_client": "10.0.0.5",
            "original_filename": "menu.png",
            "created_at": "2026-08-20T10:00:00Z",
            "state": "pending",
            "payload_path": "/tmp/menu.png",
            "some_future_field": true
        }],
        "recent": []
    });
    std::fs::write(
        dir.path().join("queue.json"),
        serde_json::to_vec_pretty(&state).unwrap(),
    )
    .unwrap();

    let queue = PrintQueue::open(dir.path()).unwrap();
    let snapshot = queue.snapshot();
    assert_eq!(snapshot.pending_count, 1);
    assert_eq!(snapshot.pending[0].original_filename, "menu.png");
}
