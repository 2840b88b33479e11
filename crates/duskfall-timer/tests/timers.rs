//! Integration tests for the deadline timer service.
//!
//! Uses a paused Tokio clock so deadlines resolve deterministically.

use std::time::Duration;

use duskfall_timer::TimerService;

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_timer_delivers_after_delay() {
    let (mut timers, mut rx) = TimerService::channel();
    let start = tokio::time::Instant::now();

    timers.schedule(Duration::from_secs(120), "night over");

    assert_eq!(rx.recv().await, Some("night over"));
    assert!(start.elapsed() >= Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn test_timers_fire_in_deadline_order() {
    let (mut timers, mut rx) = TimerService::channel();

    timers.schedule(Duration::from_secs(30), 30);
    timers.schedule(Duration::from_secs(10), 10);
    timers.schedule(Duration::from_secs(20), 20);

    assert_eq!(rx.recv().await, Some(10));
    assert_eq!(rx.recv().await, Some(20));
    assert_eq!(rx.recv().await, Some(30));
}

#[tokio::test(start_paused = true)]
async fn test_nothing_fires_before_the_deadline() {
    let (mut timers, mut rx) = TimerService::channel();
    timers.schedule(Duration::from_secs(60), ());

    let early = tokio::time::timeout(Duration::from_secs(59), rx.recv()).await;
    assert!(early.is_err(), "timer fired early");
    assert_eq!(timers.pending(), 1);
}

// =========================================================================
// Cancellation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cancelled_timer_never_delivers() {
    let (mut timers, mut rx) = TimerService::channel();
    let id = timers.schedule(Duration::from_secs(10), "stale");

    assert!(timers.cancel(id));
    assert_eq!(timers.pending(), 0);

    let result = tokio::time::timeout(Duration::from_secs(30), rx.recv()).await;
    assert!(result.is_err(), "cancelled timer delivered");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_unknown_or_twice_returns_false() {
    let (mut timers, _rx) = TimerService::channel();
    let id = timers.schedule(Duration::from_secs(10), ());
    assert!(timers.cancel(id));
    assert!(!timers.cancel(id));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_all_only_affects_pending_timers() {
    let (mut timers, mut rx) = TimerService::channel();
    timers.schedule(Duration::from_secs(1), 1);
    timers.schedule(Duration::from_secs(50), 50);
    timers.schedule(Duration::from_secs(60), 60);

    assert_eq!(rx.recv().await, Some(1));
    tokio::task::yield_now().await;

    assert_eq!(timers.cancel_all(), 2);
    let result = tokio::time::timeout(Duration::from_secs(120), rx.recv()).await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_fire_leaves_message_queued() {
    // The race a game actor has to tolerate: the timer fires, then the
    // phase ends early and cancels it. The message is already queued.
    let (mut timers, mut rx) = TimerService::channel();
    let id = timers.schedule(Duration::from_secs(5), "late");

    tokio::time::sleep(Duration::from_secs(6)).await;
    tokio::task::yield_now().await;

    assert!(!timers.cancel(id));
    assert_eq!(rx.try_recv(), Ok("late"));
}

// =========================================================================
// Deadlines
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_remaining_counts_down() {
    let (mut timers, _rx) = TimerService::channel();
    let id = timers.schedule(Duration::from_secs(100), ());

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(timers.remaining(id), Some(Duration::from_secs(60)));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_is_none_after_fire() {
    let (mut timers, mut rx) = TimerService::channel();
    let id = timers.schedule(Duration::from_secs(1), ());
    rx.recv().await;
    tokio::task::yield_now().await;

    assert_eq!(timers.deadline(id), None);
    assert_eq!(timers.remaining(id), None);
    assert_eq!(timers.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_service_aborts_pending_timers() {
    let (mut timers, mut rx) = TimerService::channel();
    timers.schedule(Duration::from_secs(10), ());
    drop(timers);

    // All senders are gone once the aborted task is dropped.
    let result = tokio::time::timeout(Duration::from_secs(30), rx.recv()).await;
    assert_eq!(result, Ok(None));
}
