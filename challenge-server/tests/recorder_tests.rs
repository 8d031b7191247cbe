
use challenge_core::fallback_challenge;
use challenge_persistence::CompletionStore;
use challenge_types::{DateRange, MissingResource, RecordDecision, StatsSource};
use test_helpers::*;
use uuid::Uuid;

fn is_recorded(decision: &RecordDecision) -> bool {
    matches!(decision, RecordDecision::Recorded { .. })
}

fn is_already_completed(decision: &RecordDecision) -> bool {
    matches!(decision, RecordDecision::AlreadyCompleted { .. })
}

#[tokio::test]
async fn test_concurrent_records_for_same_day_award_once() {
    let backend = TestBackend::new().await;
    let user_id = Uuid::new_v4();
    backend.publish(today(), 75).await;
    backend.seed_result(user_id, "tab-a").await;
    backend.seed_result(user_id, "tab-b").await;
    let recorder = backend.recorder();

    let (a, b) = futures::join!(
        recorder.record_at(record_request(user_id, "tab-a"), now()),
        recorder.record_at(record_request(user_id, "tab-b"), now()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(
        (is_recorded(&a) && is_already_completed(&b))
            || (is_already_completed(&a) && is_recorded(&b)),
        "expected one recorded and one duplicate, got {:?} and {:?}",
        a,
        b
    );

    let report = backend
        .stats_service()
        .get_stats_at(user_id, None, now())
        .await
        .into_report();
    assert_eq!(report.source, StatsSource::Authoritative);
    assert_eq!(report.stats.total_points, 75);
    assert_eq!(report.stats.current_streak, 1);
}

#[tokio::test]
async fn test_recorded_points_come_from_the_published_challenge() {
    let backend = TestBackend::new().await;
    let user_id = Uuid::new_v4();
    backend.publish(today(), 125).await;
    backend.seed_result(user_id, "game-1").await;

    let decision = backend
        .recorder()
        .record_at(record_request(user_id, "game-1"), now())
        .await
        .unwrap();

    let RecordDecision::Recorded {
        completion,
        earned_points,
    } = decision
    else {
        panic!("expected a recorded completion, got {:?}", decision);
    };
    assert_eq!(earned_points, 125);
    assert_eq!(completion.challenge_date, today());
    assert_eq!(completion.source_result_id, "game-1");

    // Mirrored locally as already synced.
    let entries = backend.local.entries(user_id).await;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].synced);
    assert_eq!(entries[0].completion, completion);
}

#[tokio::test]
async fn test_result_of_another_user_is_not_found() {
    let backend = TestBackend::new().await;
    let owner = Uuid::new_v4();
    backend.publish(today(), 100).await;
    backend.seed_result(owner, "game-1").await;

    let decision = backend
        .recorder()
        .record_at(record_request(Uuid::new_v4(), "game-1"), now())
        .await
        .unwrap();

    assert_eq!(
        decision,
        RecordDecision::NotFound {
            resource: MissingResource::SourceResult
        }
    );
}

#[tokio::test]
async fn test_day_without_challenge_is_not_found() {
    let backend = TestBackend::new().await;
    let user_id = Uuid::new_v4();
    backend.seed_result(user_id, "game-1").await;

    let decision = backend
        .recorder()
        .record_at(record_request(user_id, "game-1"), now())
        .await
        .unwrap();

    assert_eq!(
        decision,
        RecordDecision::NotFound {
            resource: MissingResource::DailyChallenge
        }
    );
}

#[tokio::test]
async fn test_offline_completion_is_captured_then_reconciled() {
    let backend = TestBackend::new().await;
    let user_id = Uuid::new_v4();
    backend.publish(today(), 140).await;
    backend.seed_result(user_id, "game-1").await;
    let recorder = backend.recorder();
    let stats = backend.stats_service();

    backend.set_online(false);
    let decision = recorder
        .record_at(record_request(user_id, "game-1"), now())
        .await
        .unwrap();
    let fallback_points = fallback_challenge(today()).points;
    assert!(matches!(
        decision,
        RecordDecision::PendingSync { earned_points, .. } if earned_points == fallback_points
    ));

    // A second capture for the same day is a duplicate.
    let again = recorder
        .record_at(record_request(user_id, "game-2"), now())
        .await
        .unwrap();
    assert!(is_already_completed(&again));

    let offline = stats.get_stats_at(user_id, None, now()).await.into_report();
    assert_eq!(offline.source, StatsSource::LocalFallback);
    assert!(offline.degraded);
    assert_eq!(offline.stats.total_points, fallback_points);
    assert_eq!(offline.stats.current_streak, 1);

    backend.set_online(true);
    let report = backend.reconciler().reconcile(user_id).await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(report.remaining, 0);
    assert!(backend.local.unsynced(user_id).await.is_empty());

    // Once synced, the day is worth what the published challenge says.
    let online = stats.get_stats_at(user_id, None, now()).await.into_report();
    assert_eq!(online.source, StatsSource::Authoritative);
    assert_eq!(online.stats.total_points, 140);
    assert_eq!(online.stats.current_streak, 1);

    let entries = backend.local.entries(user_id).await;
    assert_eq!(entries[0].completion.earned_points, 140);
    assert!(entries[0].synced);
}

#[tokio::test]
async fn test_offline_capture_without_result_or_challenge_is_dropped_on_sync() {
    let backend = TestBackend::new().await;
    let user_id = Uuid::new_v4();
    let recorder = backend.recorder();

    backend.set_online(false);
    let decision = recorder
        .record_at(record_request(user_id, "ghost"), now())
        .await
        .unwrap();
    assert!(matches!(decision, RecordDecision::PendingSync { .. }));

    backend.set_online(true);
    let report = backend.reconciler().reconcile(user_id).await.unwrap();
    assert_eq!(report.synced, 0);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.remaining, 0);
    assert!(backend.local.entries(user_id).await.is_empty());

    let stored = backend
        .completions
        .inner()
        .find(user_id, DateRange::new(days_ago(30), today()).unwrap())
        .await
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn test_offline_capture_for_day_without_challenge_is_dropped_on_sync() {
    let backend = TestBackend::new().await;
    let user_id = Uuid::new_v4();
    backend.seed_result(user_id, "game-1").await;

    backend.set_online(false);
    backend
        .recorder()
        .record_at(record_request(user_id, "game-1"), now())
        .await
        .unwrap();

    backend.set_online(true);
    let report = backend.reconciler().reconcile(user_id).await.unwrap();
    assert_eq!(report.rejected, 1);
    assert!(backend.local.unsynced(user_id).await.is_empty());
}

#[tokio::test]
async fn test_reconcile_while_still_offline_keeps_entries() {
    let backend = TestBackend::new().await;
    let user_id = Uuid::new_v4();
    backend.set_online(false);
    backend
        .recorder()
        .record_at(record_request(user_id, "game-1"), now())
        .await
        .unwrap();

    let report = backend.reconciler().reconcile(user_id).await.unwrap();

    assert_eq!(report.synced, 0);
    assert_eq!(report.remaining, 1);
    assert_eq!(backend.local.unsynced(user_id).await.len(), 1);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_before_any_lookup() {
    let backend = TestBackend::new().await;
    backend.set_online(false);
    let recorder = backend.recorder();

    let mut request = record_request(Uuid::new_v4(), "game-1");
    request.game_type = "sudoku".to_string();
    let decision = recorder.record_at(request, now()).await.unwrap();

    assert!(matches!(decision, RecordDecision::Invalid { .. }));
    assert!(backend.local.entries(Uuid::new_v4()).await.is_empty());
}
