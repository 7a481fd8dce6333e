// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use tcs_core::RestartPolicy;

fn settings(policy: RestartPolicy, max: u32, window_secs: f64) -> RestartSettings {
    RestartSettings {
        policy,
        delay: Duration::from_millis(10),
        max,
        window: Duration::from_secs_f64(window_secs),
    }
}

#[test]
fn defaults_match_the_configuration_contract() {
    let defaults = RestartSettings::default();
    assert_eq!(defaults.policy, RestartPolicy::No);
    assert_eq!(defaults.delay, Duration::from_secs_f64(5.0));
    assert_eq!(defaults.max, 0);
    assert_eq!(defaults.window, Duration::from_secs_f64(60.0));
}

#[test]
fn entry_parsing_reads_all_fields() {
    let entry = json!({
        "type": "mock_crashing",
        "restart": "on-failure",
        "restart_sec": 0.5,
        "restart_max": 3,
        "restart_window": 30.0,
    });
    let parsed = RestartSettings::from_service_entry(entry.as_object().unwrap());
    assert_eq!(parsed.policy, RestartPolicy::OnFailure);
    assert_eq!(parsed.delay, Duration::from_secs_f64(0.5));
    assert_eq!(parsed.max, 3);
    assert_eq!(parsed.window, Duration::from_secs_f64(30.0));
}

#[test]
fn unknown_policy_string_falls_back_to_no() {
    let entry = json!({"restart": "sometimes"});
    let parsed = RestartSettings::from_service_entry(entry.as_object().unwrap());
    assert_eq!(parsed.policy, RestartPolicy::No);
}

#[test]
fn integer_restart_sec_is_accepted() {
    let entry = json!({"restart": "always", "restart_sec": 2});
    let parsed = RestartSettings::from_service_entry(entry.as_object().unwrap());
    assert_eq!(parsed.delay, Duration::from_secs_f64(2.0));
}

#[test]
fn tracker_prunes_outside_the_window() {
    let mut tracker = RestartTracker::new();
    let start = Instant::now();
    tracker.record(start);
    tracker.record(start + Duration::from_secs(30));

    tracker.prune(start + Duration::from_secs(45), Duration::from_secs(60));
    assert_eq!(tracker.count(), 2);

    // First entry is now 70 s old and falls out of the 60 s window.
    tracker.prune(start + Duration::from_secs(70), Duration::from_secs(60));
    assert_eq!(tracker.count(), 1);
}

#[yare::parameterized(
    no_policy          = { RestartPolicy::No, 1, false },
    always_any_exit    = { RestartPolicy::Always, 1, true },
    on_failure_nonzero = { RestartPolicy::OnFailure, 2, true },
    on_abnormal_signal = { RestartPolicy::OnAbnormal, 137, true },
    on_abnormal_error  = { RestartPolicy::OnAbnormal, 1, false },
)]
fn verdict_follows_policy(policy: RestartPolicy, exit_code: i32, wants: bool) {
    let mut tracker = RestartTracker::new();
    let verdict = evaluate_crash(&settings(policy, 0, 60.0), &mut tracker, exit_code, Instant::now());
    assert_eq!(verdict.policy_wants, wants);
    assert!(!verdict.limit_reached);
    assert_eq!(verdict.will_restart(), wants);
}

#[test]
fn limit_blocks_restart_when_window_is_full() {
    let mut tracker = RestartTracker::new();
    let now = Instant::now();
    let settings = settings(RestartPolicy::Always, 3, 60.0);

    for i in 0..3 {
        tracker.record(now + Duration::from_secs(i));
    }
    let verdict = evaluate_crash(&settings, &mut tracker, 1, now + Duration::from_secs(10));
    assert!(verdict.policy_wants);
    assert!(verdict.limit_reached);
    assert!(!verdict.will_restart());
    assert_eq!(verdict.restart_count, 3);
}

#[test]
fn zero_max_means_unlimited() {
    let mut tracker = RestartTracker::new();
    let now = Instant::now();
    for i in 0..50 {
        tracker.record(now + Duration::from_millis(i));
    }
    let verdict =
        evaluate_crash(&settings(RestartPolicy::Always, 0, 60.0), &mut tracker, 1, now + Duration::from_secs(1));
    assert!(!verdict.limit_reached);
    assert!(verdict.will_restart());
}

#[test]
fn window_elapsing_frees_a_restart_slot() {
    let mut tracker = RestartTracker::new();
    let now = Instant::now();
    let settings = settings(RestartPolicy::Always, 2, 60.0);

    tracker.record(now);
    tracker.record(now + Duration::from_secs(1));

    // Inside the window: both restarts count, limit reached.
    let blocked = evaluate_crash(&settings, &mut tracker, 1, now + Duration::from_secs(30));
    assert!(blocked.limit_reached);

    // The first restart ages out; the next crash may restart again.
    let allowed = evaluate_crash(&settings, &mut tracker, 1, now + Duration::from_secs(61));
    assert!(!allowed.limit_reached);
    assert!(allowed.will_restart());
    assert_eq!(allowed.restart_count, 1);
}
