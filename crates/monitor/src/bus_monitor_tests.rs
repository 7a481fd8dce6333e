// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tcs_bus::CollectingSink;

fn collecting_monitor(name: &str) -> (BusMonitor, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    let monitor = BusMonitor::new(
        name,
        Some(sink.clone() as Arc<dyn MessageSink>),
        BusMonitorOptions {
            heartbeat_interval: Duration::from_millis(50),
            healthcheck_interval: Duration::from_millis(120),
            parent_name: Some("launcher.abc123".to_string()),
            runner_id: Some("launcher.abc123.guider".to_string()),
            ..BusMonitorOptions::default()
        },
    );
    (monitor, sink)
}

#[tokio::test]
async fn registration_publishes_start_and_initial_status() {
    let (monitor, sink) = collecting_monitor("guider.jk15");
    monitor.set_status(Status::Startup, None);
    monitor.send_registration().await;

    let messages = sink.messages();
    assert_eq!(messages.len(), 2);

    let (subject, start) = &messages[0];
    assert_eq!(subject, "svc.registry.start.guider.jk15");
    assert_eq!(start["event"], "start");
    assert_eq!(start["status"], "startup");
    assert_eq!(start["runner_id"], "launcher.abc123.guider");
    assert_eq!(start["parent"], "launcher.abc123");
    assert!(start["pid"].as_u64().is_some());
    assert!(start["hostname"].as_str().is_some());

    let (subject, status) = &messages[1];
    assert_eq!(subject, "svc.status.guider.jk15");
    assert_eq!(status["name"], "guider.jk15");
    assert_eq!(status["parent"], "launcher.abc123");
}

#[tokio::test]
async fn shutdown_publishes_stop_event() {
    let (monitor, sink) = collecting_monitor("guider.jk15");
    monitor.send_shutdown().await;

    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    let (subject, stop) = &messages[0];
    assert_eq!(subject, "svc.registry.stop.guider.jk15");
    assert_eq!(stop["event"], "stop");
    assert_eq!(stop["status"], "shutdown");
    assert_eq!(stop["reason"], "shutdown");
}

#[tokio::test]
async fn status_changes_are_published_while_monitoring() {
    let (monitor, sink) = collecting_monitor("guider.jk15");
    monitor.start_monitoring().await;

    monitor.set_status(Status::Ok, Some("tracking"));
    // Give the publisher task a chance to drain.
    tokio::time::sleep(Duration::from_millis(100)).await;
    monitor.stop_monitoring().await;

    let status_updates: Vec<_> = sink
        .messages()
        .into_iter()
        .filter(|(subject, _)| subject.starts_with("svc.status."))
        .collect();
    assert!(!status_updates.is_empty(), "expected a change-driven status publish");
    let (_, report) = &status_updates[0];
    assert_eq!(report["status"], "ok");
    assert_eq!(report["message"], "tracking");
}

#[tokio::test]
async fn heartbeats_flow_at_the_configured_interval() {
    let (monitor, sink) = collecting_monitor("guider.jk15");
    monitor.set_status(Status::Ok, None);
    monitor.start_monitoring().await;
    tokio::time::sleep(Duration::from_millis(180)).await;
    monitor.stop_monitoring().await;

    let heartbeats: Vec<_> = sink
        .subjects()
        .into_iter()
        .filter(|subject| subject == "svc.heartbeat.guider.jk15")
        .collect();
    assert!(heartbeats.len() >= 2, "expected repeated heartbeats, saw {}", heartbeats.len());
}

#[tokio::test]
async fn unhealthy_healthcheck_updates_status() {
    let (monitor, _sink) = collecting_monitor("guider.jk15");
    monitor.set_status(Status::Ok, None);
    monitor.monitor().add_healthcheck_fn(|| Some(Status::Degraded));
    monitor.start_monitoring().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    monitor.stop_monitoring().await;

    assert_eq!(monitor.status(), Status::Degraded);
}

#[tokio::test]
async fn without_sink_everything_is_local() {
    let monitor = BusMonitor::new("standalone.dev", None, BusMonitorOptions::default());
    assert!(!monitor.is_publishing());

    monitor.start_monitoring().await;
    monitor.send_registration().await;
    monitor.set_status(Status::Ok, None);
    monitor.send_shutdown().await;
    monitor.stop_monitoring().await;

    assert_eq!(monitor.status(), Status::Ok);
}

#[tokio::test]
async fn stop_monitoring_is_idempotent() {
    let (monitor, _sink) = collecting_monitor("guider.jk15");
    monitor.start_monitoring().await;
    monitor.stop_monitoring().await;
    monitor.stop_monitoring().await;
}
