// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn start_event() -> RegistryEvent {
    RegistryEvent::Start {
        service_id: "mock_permanent.t1".to_string(),
        timestamp: UtcTimestamp::now(),
        parent: Some("launcher.abc123".to_string()),
        runner_id: Some("launcher.abc123.mock_permanent".to_string()),
        status: Status::Startup,
        hostname: "obs-host".to_string(),
        pid: 4242,
    }
}

#[test]
fn start_event_wire_form() {
    let json = serde_json::to_value(start_event()).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj["event"], "start");
    assert_eq!(obj["service_id"], "mock_permanent.t1");
    assert_eq!(obj["status"], "startup");
    assert_eq!(obj["hostname"], "obs-host");
    assert_eq!(obj["pid"], 4242);
    assert_eq!(obj["parent"], "launcher.abc123");
}

#[test]
fn subject_includes_kind_and_service_id() {
    let event = start_event();
    assert_eq!(event.subject("svc"), "svc.registry.start.mock_permanent.t1");
    assert_eq!(event.kind(), "start");
    assert_eq!(event.service_id(), "mock_permanent.t1");
}

#[test]
fn declared_omits_absent_options() {
    let event = RegistryEvent::Declared {
        service_id: "guider.jk15".to_string(),
        timestamp: UtcTimestamp::now(),
        parent: None,
        runner_id: None,
        restart_policy: RestartPolicy::OnFailure,
    };
    let json = serde_json::to_value(&event).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj["event"], "declared");
    assert_eq!(obj["restart_policy"], "on-failure");
    assert!(!obj.contains_key("parent"));
    assert!(!obj.contains_key("runner_id"));
}

#[test]
fn events_round_trip_through_json() {
    let events = vec![
        start_event(),
        RegistryEvent::Crashed {
            service_id: "mock_crashing.c1".to_string(),
            timestamp: UtcTimestamp::now(),
            parent: None,
            runner_id: Some("r1".to_string()),
            status: Status::Failed,
            exit_code: 1,
            restart_policy: RestartPolicy::No,
            will_restart: false,
        },
        RegistryEvent::Restarting {
            service_id: "mock_crashing.c2".to_string(),
            timestamp: UtcTimestamp::now(),
            parent: None,
            runner_id: Some("r2".to_string()),
            status: Status::Startup,
            restart_attempt: 2,
            max_restarts: Some(3),
        },
        RegistryEvent::Failed {
            service_id: "mock_crashing.c2".to_string(),
            timestamp: UtcTimestamp::now(),
            parent: None,
            runner_id: Some("r2".to_string()),
            status: Status::Failed,
            reason: "restart_limit_reached".to_string(),
            restart_count: 3,
        },
    ];
    for event in events {
        let json = serde_json::to_string(&event).unwrap();
        let back: RegistryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}

#[test]
fn heartbeat_carries_status() {
    let hb = Heartbeat {
        service_id: "guider.jk15".to_string(),
        timestamp: UtcTimestamp::now(),
        status: Status::Busy,
    };
    let json = serde_json::to_value(&hb).unwrap();
    assert_eq!(json["status"], "busy");
    assert_eq!(json["service_id"], "guider.jk15");
}
