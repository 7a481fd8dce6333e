// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn ts(offset_secs: i64) -> Value {
    let dt = Utc::now() - ChronoDuration::seconds(offset_secs);
    serde_json::to_value(UtcTimestamp(dt)).unwrap()
}

fn start_event(service_id: &str, offset_secs: i64) -> Value {
    json!({
        "event": "start",
        "service_id": service_id,
        "timestamp": ts(offset_secs),
        "status": "startup",
        "hostname": "obs-host",
        "pid": 4242,
        "runner_id": format!("launcher.abc.{service_id}"),
        "parent": "launcher.abc",
    })
}

#[test]
fn start_event_populates_lifecycle_fields() {
    let mut services = HashMap::new();
    apply_registry_event(&mut services, &start_event("a.x", 120));

    let info = &services["a.x"];
    assert!(info.start_time.is_some());
    assert!(info.stop_time.is_none());
    assert_eq!(info.hostname.as_deref(), Some("obs-host"));
    assert_eq!(info.pid, Some(4242));
    assert_eq!(info.runner_id.as_deref(), Some("launcher.abc.a.x"));
    assert_eq!(info.parent.as_deref(), Some("launcher.abc"));
    assert!(!info.declared);
}

#[test]
fn declared_marks_the_record() {
    let mut services = HashMap::new();
    apply_registry_event(
        &mut services,
        &json!({
            "event": "declared",
            "service_id": "a.x",
            "timestamp": ts(0),
            "restart_policy": "always",
        }),
    );
    assert!(services["a.x"].declared);
}

#[test]
fn stop_after_start_marks_the_service_stopped() {
    let mut services = HashMap::new();
    apply_registry_event(&mut services, &start_event("b.y", 600));
    apply_registry_event(
        &mut services,
        &json!({
            "event": "stop",
            "service_id": "b.y",
            "timestamp": ts(60),
            "status": "shutdown",
            "reason": "completed",
            "exit_code": 0,
        }),
    );

    compute_uptime(&mut services, Utc::now());
    let info = &services["b.y"];
    assert!(info.stop_time.is_some());
    assert!(info.uptime_seconds.is_none());
}

#[test]
fn restart_clears_a_previous_stop() {
    let mut services = HashMap::new();
    apply_registry_event(&mut services, &start_event("a.x", 600));
    apply_registry_event(
        &mut services,
        &json!({
            "event": "stop",
            "service_id": "a.x",
            "timestamp": ts(300),
            "status": "shutdown",
            "reason": "completed",
            "exit_code": 0,
        }),
    );
    apply_registry_event(&mut services, &start_event("a.x", 200));

    let info = &services["a.x"];
    assert!(info.stop_time.is_none());
}

#[test]
fn crashed_event_sets_stop_time() {
    let mut services = HashMap::new();
    apply_registry_event(&mut services, &start_event("c.z", 600));
    apply_registry_event(
        &mut services,
        &json!({
            "event": "crashed",
            "service_id": "c.z",
            "timestamp": ts(60),
            "status": "failed",
            "exit_code": 1,
            "restart_policy": "no",
            "will_restart": false,
        }),
    );
    assert!(services["c.z"].stop_time.is_some());
}

#[test]
fn status_report_owns_current_state() {
    let mut services = HashMap::new();
    apply_registry_event(&mut services, &start_event("a.x", 600));
    apply_status_report(
        &mut services,
        &json!({
            "name": "a.x",
            "status": "degraded",
            "timestamp": ts(5),
            "message": "sensor flaky",
        }),
    );

    let info = &services["a.x"];
    assert_eq!(info.status, Status::Degraded);
    assert_eq!(info.status_message.as_deref(), Some("sensor flaky"));
    assert!(info.last_status_update.is_some());
}

#[test]
fn status_for_unseen_service_creates_a_record() {
    let mut services = HashMap::new();
    apply_status_report(
        &mut services,
        &json!({"name": "fresh.dev", "status": "ok", "timestamp": ts(0)}),
    );
    assert_eq!(services["fresh.dev"].status, Status::Ok);
}

#[test]
fn heartbeats_keep_only_the_newest_timestamp() {
    let mut services = HashMap::new();
    apply_heartbeat(
        &mut services,
        &json!({"service_id": "a.x", "timestamp": ts(10), "status": "ok"}),
    );
    let newer = services["a.x"].last_heartbeat;
    apply_heartbeat(
        &mut services,
        &json!({"service_id": "a.x", "timestamp": ts(60), "status": "ok"}),
    );
    assert_eq!(services["a.x"].last_heartbeat, newer);
}

#[test]
fn uptime_is_computed_for_running_services_only() {
    let mut services = HashMap::new();
    apply_registry_event(&mut services, &start_event("a.x", 90));
    compute_uptime(&mut services, Utc::now());

    let uptime = services["a.x"].uptime_seconds.unwrap();
    assert!((uptime - 90.0).abs() < 2.0, "uptime {uptime}");
}

#[test]
fn malformed_payloads_are_ignored() {
    let mut services = HashMap::new();
    assert!(apply_registry_event(&mut services, &json!({"event": "start"})).is_none());
    assert!(apply_status_report(&mut services, &json!({"status": "ok"})).is_none());
    assert!(apply_heartbeat(&mut services, &json!({"service_id": "x.y"})).is_none());
    assert!(services.is_empty());
}

#[test]
fn snapshot_fusion_matches_the_fleet_scenario() {
    // Three services: a.x running+heartbeating, b.y stopped, c.z crashed.
    let mut services = HashMap::new();
    for id in ["a.x", "b.y", "c.z"] {
        apply_registry_event(
            &mut services,
            &json!({
                "event": "declared",
                "service_id": id,
                "timestamp": ts(900),
                "restart_policy": "no",
            }),
        );
        apply_registry_event(&mut services, &start_event(id, 600));
    }
    apply_registry_event(
        &mut services,
        &json!({
            "event": "stop",
            "service_id": "b.y",
            "timestamp": ts(300),
            "status": "shutdown",
            "reason": "completed",
            "exit_code": 0,
        }),
    );
    apply_registry_event(
        &mut services,
        &json!({
            "event": "crashed",
            "service_id": "c.z",
            "timestamp": ts(200),
            "status": "failed",
            "exit_code": 1,
            "restart_policy": "no",
            "will_restart": false,
        }),
    );
    apply_status_report(
        &mut services,
        &json!({"name": "a.x", "status": "ok", "timestamp": ts(5)}),
    );
    apply_status_report(
        &mut services,
        &json!({"name": "c.z", "status": "failed", "timestamp": ts(200)}),
    );
    apply_heartbeat(
        &mut services,
        &json!({"service_id": "a.x", "timestamp": ts(5), "status": "ok"}),
    );
    let now = Utc::now();
    compute_uptime(&mut services, now);

    assert_eq!(services.len(), 3);
    for info in services.values() {
        assert!(info.declared);
    }

    let a = &services["a.x"];
    assert!(a.is_running());
    assert_eq!(a.heartbeat_state(now), crate::info::HeartbeatState::Alive);
    assert!(a.uptime_seconds.is_some());

    let b = &services["b.y"];
    assert!(!b.is_running());
    assert_eq!(b.heartbeat_state(now), crate::info::HeartbeatState::None);

    let c = &services["c.z"];
    assert!(!c.is_running());
    assert_eq!(c.status, Status::Failed);
}
