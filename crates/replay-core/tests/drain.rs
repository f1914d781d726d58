mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rstest::rstest;
use serde_json::json;

use common::{Harness, add, delete, mark_gotten, server_error, update};
use replay_core::app::{QueueConfig, QueueEvent, StatusChange};
use replay_core::domain::{EngineOp, QueueError, SyncError};
use replay_core::ports::Resolution;
use replay_core::queue::MutationStatus;

#[tokio::test]
async fn delete_runs_before_earlier_adds() {
    let h = Harness::new();
    h.queue.record(add("groceries", "milk")).await.unwrap();
    h.advance(Duration::from_millis(1));
    h.queue.record(add("groceries", "eggs")).await.unwrap();
    h.advance(Duration::from_millis(1));
    h.queue.record(delete("item-7")).await.unwrap();

    let summary = h.queue.process_queue().await;

    let ops: Vec<_> = h.engine.calls().into_iter().map(|(op, _)| op).collect();
    assert_eq!(ops, vec![EngineOp::Delete, EngineOp::Create, EngineOp::Create]);
    let names: Vec<_> = h
        .engine
        .calls()
        .into_iter()
        .filter(|(op, _)| *op == EngineOp::Create)
        .map(|(_, payload)| payload["item"]["name"].clone())
        .collect();
    assert_eq!(names, vec![json!("milk"), json!("eggs")]);

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 3);
    assert!(summary.pending.is_empty());
    assert!(h.queue.get_queued_mutations().await.is_empty());
    let status = h.queue.get_status().await;
    assert_eq!((status.pending, status.failed), (0, 0));
    assert_eq!(h.successes(), 3);
}

#[tokio::test]
async fn mutation_types_map_to_engine_operations() {
    let h = Harness::new();
    h.queue.record(add("groceries", "tea")).await.unwrap();
    h.queue
        .record(update("item-1", json!({ "quantity": 3 })))
        .await
        .unwrap();
    h.queue.record(mark_gotten("item-2")).await.unwrap();
    h.queue.record(delete("item-3")).await.unwrap();

    h.queue.process_queue().await;

    let calls = h.engine.calls();
    assert_eq!(
        calls.iter().map(|(op, _)| *op).collect::<Vec<_>>(),
        vec![
            EngineOp::Delete,
            EngineOp::Update,
            EngineOp::Update,
            EngineOp::Create
        ]
    );
    assert_eq!(calls[0].1, json!({ "itemId": "item-3" }));
    assert_eq!(calls[2].1, json!({ "itemId": "item-2", "gotten": true }));
}

#[tokio::test]
async fn queue_order_is_priority_then_age() {
    let h = Harness::new();
    let intents = [
        add("groceries", "rice"),
        mark_gotten("item-1"),
        delete("item-2"),
        update("item-3", json!({ "notes": "brown" })),
        add("groceries", "beans"),
        delete("item-4"),
    ];
    for intent in intents {
        h.queue.record(intent).await.unwrap();
        h.advance(Duration::from_millis(1));
    }

    let queued = h.queue.get_queued_mutations().await;

    assert_eq!(queued.len(), 6);
    assert!(queued.windows(2).all(|w| {
        w[0].priority > w[1].priority
            || (w[0].priority == w[1].priority && w[0].created_at <= w[1].created_at)
    }));
}

#[tokio::test]
async fn empty_drains_are_idempotent() {
    let h = Harness::new();

    let first = h.queue.process_queue().await;
    let second = h.queue.process_queue().await;

    assert_eq!(first.processed, 0);
    assert_eq!(first, second);
    assert_eq!(h.queue.get_status().await.total, 0);
    assert!(h.engine.calls().is_empty());
    let events = h.events();
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|e| matches!(e, QueueEvent::QueueProcessed(_))));
}

#[tokio::test]
async fn server_error_fails_permanently_on_fifth_attempt() {
    let h = Harness::new();
    h.engine.fail_always(server_error());
    let id = h
        .queue
        .record(update("item-1", json!({ "quantity": 2 })))
        .await
        .unwrap();

    for attempt in 1..=5u32 {
        let summary = h.queue.process_queue().await;
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);

        let m = h.queue.get_mutation(id).await.unwrap();
        assert_eq!(m.retry_count, attempt);
        assert_eq!(m.last_error.as_deref(), Some("server error 503: service unavailable"));
        assert_eq!(m.last_attempt_at, Some(h.clock_now()));
        if attempt < 5 {
            assert_eq!(m.status, MutationStatus::Pending);
            assert!(!m.permanent);
            assert_eq!(h.permanent_failures(), 0);
        } else {
            assert_eq!(m.status, MutationStatus::Failed);
            assert!(m.permanent);
            assert_eq!(summary.permanently_failed, 1);
        }
        h.advance(Duration::from_secs(60));
    }
    assert_eq!(h.permanent_failures(), 1);

    let summary = h.queue.process_queue().await;
    assert_eq!(summary.processed, 0);
    assert_eq!(h.engine.calls().len(), 5);
    assert_eq!(h.permanent_failures(), 1);
    assert_eq!(h.queue.get_status().await.failed, 1);
}

#[tokio::test]
async fn retry_failed_keeps_count_and_sixth_failure_stays_failed() {
    let h = Harness::new();
    h.engine.fail_always(server_error());
    let id = h.queue.record(delete("item-5")).await.unwrap();
    for _ in 0..5 {
        h.queue.process_queue().await;
        h.advance(Duration::from_secs(60));
    }
    assert_eq!(h.queue.get_mutation(id).await.unwrap().retry_count, 5);

    let summary = h.queue.retry_failed().await;

    assert_eq!(summary.processed, 1);
    let m = h.queue.get_mutation(id).await.unwrap();
    assert_eq!(m.retry_count, 6);
    assert_eq!(m.status, MutationStatus::Failed);
    assert!(m.permanent);
    assert!(h.events().iter().any(|e| matches!(
        e,
        QueueEvent::StatusChanged(StatusChange {
            from: MutationStatus::Failed,
            to: MutationStatus::Pending,
            ..
        })
    )));
}

#[tokio::test]
async fn retry_failed_can_still_succeed() {
    let h = Harness::new();
    h.engine.push(Err(SyncError::from_status(422, "unknown list")));
    let id = h.queue.record(add("groceries", "kale")).await.unwrap();
    h.queue.process_queue().await;
    assert!(h.queue.get_mutation(id).await.unwrap().permanent);

    h.advance(Duration::from_secs(5));
    let summary = h.queue.retry_failed().await;

    assert_eq!(summary.succeeded, 1);
    assert!(h.queue.get_mutation(id).await.is_none());
}

#[rstest]
#[case::bad_request(SyncError::from_status(400, "bad payload"))]
#[case::gone(SyncError::from_status(404, "no such item"))]
#[case::validation(SyncError::Validation("quantity must be positive".into()))]
#[tokio::test]
async fn permanent_errors_are_not_retried(#[case] error: SyncError) {
    let h = Harness::new();
    h.engine.push(Err(error));
    let id = h
        .queue
        .record(update("item-1", json!({ "quantity": -1 })))
        .await
        .unwrap();

    let summary = h.queue.process_queue().await;
    assert_eq!(summary.permanently_failed, 1);
    let m = h.queue.get_mutation(id).await.unwrap();
    assert_eq!(m.status, MutationStatus::Failed);
    assert_eq!(m.retry_count, 1);
    assert!(m.permanent);

    h.advance(Duration::from_secs(600));
    let summary = h.queue.process_queue().await;
    assert_eq!(summary.processed, 0);
    assert_eq!(h.engine.calls().len(), 1);
    assert_eq!(h.permanent_failures(), 1);
}

#[tokio::test]
async fn backoff_defers_until_delay_has_elapsed() {
    let h = Harness::new();
    h.engine.push(Err(SyncError::Network("airplane mode".into())));
    let id = h.queue.record(mark_gotten("item-8")).await.unwrap();

    let first = h.queue.process_queue().await;
    assert_eq!(first.failed, 1);
    assert_eq!(first.pending, vec![id]);
    assert_eq!(first.next_retry_in, Some(Duration::from_secs(1)));

    h.advance(Duration::from_millis(999));
    let second = h.queue.process_queue().await;
    assert_eq!(second.processed, 0);
    assert_eq!(second.deferred, 1);
    assert_eq!(second.next_retry_in, Some(Duration::from_millis(1)));

    h.advance(Duration::from_millis(1));
    let third = h.queue.process_queue().await;
    assert_eq!(third.succeeded, 1);
    assert!(third.next_retry_in.is_none());
}

#[tokio::test(start_paused = true)]
async fn short_backoff_is_waited_out_inline() {
    let h = Harness::with_config(QueueConfig {
        max_inline_wait_ms: 2_000,
        ..QueueConfig::default()
    });
    h.engine.push(Err(SyncError::Network("flaky".into())));
    h.queue.record(delete("item-3")).await.unwrap();
    h.queue.process_queue().await;

    let summary = h.queue.process_queue().await;

    assert_eq!(summary.deferred, 0);
    assert_eq!(summary.succeeded, 1);
}

#[tokio::test]
async fn success_emits_events_after_each_transition() {
    let h = Harness::new();
    let id = h.queue.record(add("groceries", "oats")).await.unwrap();

    h.queue.process_queue().await;

    let events = h.events();
    assert!(matches!(
        events.as_slice(),
        [
            QueueEvent::StatusChanged(StatusChange {
                from: MutationStatus::Pending,
                to: MutationStatus::Processing,
                ..
            }),
            QueueEvent::StatusChanged(StatusChange {
                from: MutationStatus::Processing,
                to: MutationStatus::Success,
                ..
            }),
            QueueEvent::MutationSucceeded(m),
            QueueEvent::QueueProcessed(_),
        ] if m.id == id && m.status == MutationStatus::Success
    ));
}

#[tokio::test]
async fn panicking_listener_does_not_abort_the_drain() {
    let h = Harness::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let _sub = h.queue.notifier().on_mutation_success(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        panic!("ui went away");
    });
    h.queue.record(add("groceries", "salt")).await.unwrap();
    h.queue.record(add("groceries", "pepper")).await.unwrap();

    let summary = h.queue.process_queue().await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(h.successes(), 2);
}

#[tokio::test]
async fn applied_conflict_resolution_skips_dispatch() {
    let h = Harness::new();
    h.engine.conflict_on_check(Resolution::Applied);
    h.queue
        .record(update("item-4", json!({ "name": "oat milk" })))
        .await
        .unwrap();

    let summary = h.queue.process_queue().await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(h.engine.resolutions(), 1);
    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn conflict_check_can_be_disabled() {
    let h = Harness::with_config(QueueConfig {
        check_conflicts: false,
        ..QueueConfig::default()
    });
    h.engine.conflict_on_check(Resolution::Applied);
    h.queue.record(delete("item-4")).await.unwrap();

    h.queue.process_queue().await;

    assert_eq!(h.engine.resolutions(), 0);
    assert_eq!(h.engine.calls().len(), 1);
}

#[tokio::test]
async fn unresolved_conflict_is_retried_later() {
    let h = Harness::new();
    h.engine.push(Err(SyncError::from_status(409, "stale revision")));
    h.engine.push(Err(SyncError::from_status(409, "stale revision")));
    let id = h
        .queue
        .record(update("item-2", json!({ "quantity": 4 })))
        .await
        .unwrap();

    let summary = h.queue.process_queue().await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.permanently_failed, 0);
    assert_eq!(h.engine.resolutions(), 1);
    let m = h.queue.get_mutation(id).await.unwrap();
    assert_eq!(m.status, MutationStatus::Pending);
    assert_eq!(m.retry_count, 1);
}

#[tokio::test]
async fn duplicate_enqueue_is_rejected() {
    let h = Harness::new();
    let m = h.queue.factory().delete_item("item-1").unwrap();

    h.queue.enqueue(m.clone()).await.unwrap();
    let err = h.queue.enqueue(m.clone()).await.unwrap_err();

    assert!(matches!(err, QueueError::DuplicateId(id) if id == m.id));
    assert_eq!(h.queue.get_status().await.total, 1);
}

#[tokio::test]
async fn remove_and_clear() {
    let h = Harness::new();
    let a = h.queue.record(add("groceries", "jam")).await.unwrap();
    h.queue.record(add("groceries", "butter")).await.unwrap();
    h.queue.record(delete("item-0")).await.unwrap();

    assert_eq!(h.queue.remove_mutation(a).await.map(|m| m.id), Some(a));
    assert!(h.queue.remove_mutation(a).await.is_none());
    assert_eq!(h.queue.get_status().await.pending, 2);

    assert_eq!(h.queue.clear_queue().await, 2);
    assert_eq!(h.queue.get_status().await.total, 0);
}
