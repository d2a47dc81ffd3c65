use crate::pipeline::Backoff;

use std::time::Duration;

/// WHAT: Delays double per failure and never exceed the cap
/// WHY: The backoff sequence must be non-decreasing and bounded
#[test]
fn given_consecutive_failures_when_backing_off_then_delay_doubles_to_cap() {
    let mut backoff = Backoff::new(Duration::from_millis(1000), Duration::from_millis(30_000));
    let mut observed = vec![backoff.delay()];

    for _ in 0..8 {
        backoff.on_failure();
        observed.push(backoff.delay());
    }

    let expected: Vec<Duration> = [1000u64, 2000, 4000, 8000, 16_000, 30_000, 30_000, 30_000, 30_000]
        .iter()
        .map(|ms| Duration::from_millis(*ms))
        .collect();
    assert_eq!(observed, expected);

    // Non-decreasing by construction, but assert it anyway.
    assert!(observed.windows(2).all(|w| w[0] <= w[1]));
}

/// WHAT: A success resets the delay to initial and the attempts to zero
/// WHY: The first good send after an outage must restart the ladder
#[test]
fn given_failures_when_success_then_state_resets() {
    let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_millis(8000));

    for _ in 0..5 {
        backoff.on_failure();
    }
    assert_eq!(backoff.attempts(), 5);
    assert_eq!(backoff.delay(), Duration::from_millis(8000));

    backoff.on_success();
    assert_eq!(backoff.attempts(), 0);
    assert_eq!(backoff.delay(), Duration::from_millis(500));
}

/// WHAT: Attempts count failures since the last success
/// WHY: The FATAL escalation threshold compares against this counter
#[test]
fn given_mixed_outcomes_when_counting_then_attempts_track_failures() {
    let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(400));

    backoff.on_failure();
    backoff.on_failure();
    assert_eq!(backoff.attempts(), 2);

    backoff.on_success();
    backoff.on_failure();
    assert_eq!(backoff.attempts(), 1);
}
