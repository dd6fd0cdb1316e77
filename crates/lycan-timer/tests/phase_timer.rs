//! Integration tests for the phase deadline timer.
//!
//! Uses a paused Tokio clock so `sleep_until` resolves as soon as every
//! task is idle.

use std::time::Duration;

use chrono::Utc;
use lycan_timer::{PhaseTimer, TimerConfig};

// =========================================================================
// Arming
// =========================================================================

#[test]
fn test_new_timer_is_disarmed() {
    let t = PhaseTimer::default();
    assert!(!t.is_armed());
    assert_eq!(t.deadline(), None);
    assert_eq!(t.generation(), 0);
    assert_eq!(t.stats().armed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_arm_returns_absolute_deadline() {
    let mut t = PhaseTimer::default();
    let before = Utc::now();
    let deadline = t.arm(Duration::from_secs(90));

    let ahead = (deadline - before).num_seconds();
    assert!((89..=91).contains(&ahead), "deadline {ahead}s ahead");
    assert_eq!(t.deadline(), Some(deadline));
    assert_eq!(t.generation(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_replaces_deadline() {
    let mut t = PhaseTimer::default();
    let first = t.arm(Duration::from_secs(90));
    let second = t.arm(Duration::from_secs(5));
    assert_ne!(first, second);

    let expiry = t.expired().await;
    assert_eq!(expiry.deadline, second);
    assert_eq!(expiry.generation, 2);
    assert_eq!(t.stats().armed, 2);
    assert_eq!(t.stats().fired, 1);
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_expired_fires_once_then_disarms() {
    let mut t = PhaseTimer::default();
    let deadline = t.arm(Duration::from_secs(90));

    let started = tokio::time::Instant::now();
    let expiry = t.expired().await;
    assert_eq!(expiry.deadline, deadline);
    assert!(started.elapsed() >= Duration::from_secs(89));
    assert!(!t.is_armed());

    let again = tokio::time::timeout(Duration::from_secs(600), t.expired()).await;
    assert!(again.is_err(), "a fired timer must not fire again");
}

#[tokio::test(start_paused = true)]
async fn test_past_deadline_fires_immediately() {
    let mut t = PhaseTimer::default();
    let deadline = Utc::now() - chrono::Duration::seconds(30);
    t.arm_at(deadline);

    let expiry = tokio::time::timeout(Duration::from_millis(1), t.expired())
        .await
        .expect("past deadline should fire at once");
    assert_eq!(expiry.deadline, deadline);
}

#[tokio::test(start_paused = true)]
async fn test_disarmed_timer_pends_forever() {
    let mut t = PhaseTimer::default();
    let result = tokio::time::timeout(Duration::from_secs(3600), t.expired()).await;
    assert!(result.is_err(), "disarmed timer should pend");
}

#[tokio::test(start_paused = true)]
async fn test_disarm_cancels_pending_deadline() {
    let mut t = PhaseTimer::default();
    t.arm(Duration::from_secs(1));
    t.disarm();
    t.disarm();
    assert!(!t.is_armed());

    let result = tokio::time::timeout(Duration::from_secs(10), t.expired()).await;
    assert!(result.is_err());
    assert_eq!(t.stats().fired, 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_keeps_deadline_armed() {
    let mut t = PhaseTimer::default();
    let deadline = t.arm(Duration::from_secs(10));

    // Lose a select! race before the deadline.
    tokio::select! {
        _ = t.expired() => panic!("fired too early"),
        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
    }
    assert_eq!(t.deadline(), Some(deadline));

    let expiry = t.expired().await;
    assert_eq!(expiry.deadline, deadline);
}

// =========================================================================
// Late wake-ups
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_late_wake_is_counted() {
    let mut t = PhaseTimer::new(TimerConfig {
        late_warn: Duration::from_millis(100),
    });
    t.arm(Duration::from_secs(1));

    // Jump the clock well past the deadline before polling.
    tokio::time::advance(Duration::from_secs(5)).await;
    let expiry = t.expired().await;

    assert!(expiry.late_by >= Duration::from_secs(3));
    assert_eq!(t.stats().late, 1);
    assert!(t.stats().max_late >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_on_time_wake_is_not_late() {
    let mut t = PhaseTimer::default();
    t.arm(Duration::from_secs(2));
    let expiry = t.expired().await;
    assert!(expiry.late_by < Duration::from_secs(1));
    assert_eq!(t.stats().late, 0);
}
