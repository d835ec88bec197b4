//! Idle teardown tests
//!
//! Time is paused so the grace period elapses deterministically.

mod helpers;

use gmq_common::events::{EnqueueSource, GmqEvent, PlaybackState};
use gmq_qc::backend::TrackEndReason;
use gmq_qc::session::{StopOutcome, TrackEndOutcome};
use gmq_qc::Error;
use helpers::{track, voice, wait_for_session_gone, BackendCall, Harness, GUILD};
use std::time::Duration;

const GRACE: Duration = Duration::from_secs(5);

async fn play(h: &Harness, id: &str) {
    h.registry
        .play(GUILD, vec![track(id)], EnqueueSource::Direct, Some(voice()), None)
        .await
        .unwrap();
}

async fn drain(h: &Harness, id: &str) {
    let outcome = h
        .registry
        .track_ended(GUILD, track(id), TrackEndReason::Finished)
        .await
        .unwrap();
    assert_eq!(outcome, TrackEndOutcome::Draining);
}

#[tokio::test(start_paused = true)]
async fn test_drained_session_tears_down_after_grace() {
    let h = Harness::new();
    let mut rx = h.events.subscribe();
    play(&h, "a").await;
    drain(&h, "a").await;

    let snapshot = h.registry.snapshot(GUILD).await.unwrap();
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert_eq!(snapshot.current, None);
    assert!(snapshot.teardown_pending);
    assert_eq!(h.backend.disconnects(), 0);

    tokio::time::sleep(GRACE + Duration::from_millis(1)).await;

    assert!(wait_for_session_gone(&h.registry, GUILD).await);
    assert_eq!(h.backend.disconnects(), 1);
    assert_eq!(h.backend.count(|c| matches!(c, BackendCall::Stop(_))), 0);

    let mut destroyed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let GmqEvent::SessionDestroyed { reason, .. } = event {
            destroyed.push(reason);
        }
    }
    assert_eq!(destroyed, vec!["idle".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_session_survives_until_grace_elapses() {
    let h = Harness::new();
    play(&h, "a").await;
    drain(&h, "a").await;

    tokio::time::sleep(GRACE - Duration::from_millis(100)).await;

    assert!(h.registry.contains(GUILD).await);
    assert_eq!(h.backend.disconnects(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_play_during_grace_cancels_teardown() {
    let h = Harness::new();
    play(&h, "a").await;
    let first_id = h.registry.snapshot(GUILD).await.unwrap().session_id;
    drain(&h, "a").await;

    tokio::time::sleep(Duration::from_secs(2)).await;

    let outcome = h
        .registry
        .play(GUILD, vec![track("b")], EnqueueSource::Direct, None, None)
        .await
        .unwrap();
    assert!(outcome.head.is_started());

    tokio::time::sleep(GRACE * 2).await;

    let snapshot = h.registry.snapshot(GUILD).await.unwrap();
    assert_eq!(snapshot.session_id, first_id);
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.current, Some(track("b")));
    assert!(!snapshot.teardown_pending);
    assert_eq!(h.backend.disconnects(), 0);
    // Voice link reused, no reconnect
    assert_eq!(h.backend.count(|c| matches!(c, BackendCall::Connect(_, _))), 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_session_after_teardown_has_new_identity() {
    let h = Harness::new();
    play(&h, "a").await;
    let first_id = h.registry.snapshot(GUILD).await.unwrap().session_id;
    drain(&h, "a").await;

    tokio::time::sleep(GRACE + Duration::from_millis(1)).await;
    assert!(wait_for_session_gone(&h.registry, GUILD).await);

    play(&h, "b").await;
    let second_id = h.registry.snapshot(GUILD).await.unwrap().session_id;
    assert_ne!(first_id, second_id);
    assert_eq!(h.backend.count(|c| matches!(c, BackendCall::Connect(_, _))), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_grace_disconnects_once() {
    let h = Harness::new();
    play(&h, "a").await;
    drain(&h, "a").await;

    assert_eq!(h.registry.stop(GUILD).await.unwrap(), StopOutcome::Stopped);
    tokio::time::sleep(GRACE * 2).await;

    assert!(wait_for_session_gone(&h.registry, GUILD).await);
    assert_eq!(h.backend.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_skip_while_draining_reports_nothing_playing() {
    let h = Harness::new();
    play(&h, "a").await;
    drain(&h, "a").await;

    assert!(matches!(
        h.registry.skip(GUILD).await,
        Err(Error::NothingPlaying)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_failed_first_play_releases_voice_after_grace() {
    let h = Harness::new();
    h.backend.set_fail_play(true);

    let result = h
        .registry
        .play(GUILD, vec![track("a")], EnqueueSource::Direct, Some(voice()), None)
        .await;
    assert!(matches!(result, Err(Error::Backend(_))));
    assert!(h.registry.snapshot(GUILD).await.unwrap().teardown_pending);

    tokio::time::sleep(GRACE + Duration::from_millis(1)).await;

    assert!(wait_for_session_gone(&h.registry, GUILD).await);
    assert_eq!(h.backend.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_connect_does_not_leave_session_behind() {
    let h = Harness::new();
    h.backend.set_fail_connect(true);

    let result = h
        .registry
        .play(GUILD, vec![track("a")], EnqueueSource::Direct, Some(voice()), None)
        .await;
    assert!(matches!(result, Err(Error::Backend(_))));

    tokio::time::sleep(GRACE + Duration::from_millis(1)).await;

    assert!(wait_for_session_gone(&h.registry, GUILD).await);
    // Never connected, nothing to disconnect
    assert_eq!(h.backend.disconnects(), 0);
    assert!(h.backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_play_during_grace_keeps_original_deadline() {
    let h = Harness::new();
    play(&h, "a").await;
    drain(&h, "a").await;

    tokio::time::sleep(Duration::from_secs(3)).await;
    h.backend.set_fail_play(true);
    let result = h
        .registry
        .play(GUILD, vec![track("b")], EnqueueSource::Direct, None, None)
        .await;
    assert!(result.is_err());

    // Original deadline at 5s still applies
    tokio::time::sleep(Duration::from_secs(2) + Duration::from_millis(1)).await;

    assert!(wait_for_session_gone(&h.registry, GUILD).await);
    assert_eq!(h.backend.disconnects(), 1);
}
