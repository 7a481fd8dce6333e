// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitoring invariants: aggregation, reports on the wire, heartbeats.

use std::sync::Arc;
use std::time::Duration;
use tcs_bus::{CollectingSink, MessageSink};
use tcs_core::{aggregate_status, Status, StatusReport};
use tcs_monitor::{BusMonitor, BusMonitorOptions, Monitor};

/// Walk a report tree and collect every node's own status.
fn own_statuses(report: &StatusReport) -> Vec<Status> {
    let mut statuses = Vec::new();
    let own = report
        .details
        .as_ref()
        .and_then(|details| details.get("own_status"))
        .and_then(|value| value.as_str())
        .and_then(Status::parse)
        .unwrap_or(report.status);
    statuses.push(own);

    if let Some(children) = report.details.as_ref().and_then(|d| d.get("children")) {
        for child in children.as_array().into_iter().flatten() {
            if let Ok(child_report) = serde_json::from_value::<StatusReport>(child.clone()) {
                statuses.extend(own_statuses(&child_report));
            }
        }
    }
    statuses
}

/// The report status must equal the aggregate of every node in the tree.
#[tokio::test]
async fn report_status_equals_tree_aggregate() {
    let root = Monitor::new("telescope");
    let mount = Monitor::new("mount");
    let dome = Monitor::new("dome");
    let shutter = Monitor::new("shutter");
    root.add_submonitor(&mount);
    root.add_submonitor(&dome);
    dome.add_submonitor(&shutter);

    for (monitor, status) in [
        (&root, Status::Ok),
        (&mount, Status::Busy),
        (&dome, Status::Warning),
        (&shutter, Status::Error),
    ] {
        monitor.set_status(status, None);
    }

    let report = root.full_report().await;
    let statuses = own_statuses(&report);
    assert_eq!(statuses.len(), 4);
    assert_eq!(report.status, aggregate_status(&statuses));
    assert_eq!(report.status, Status::Error);
}

#[tokio::test]
async fn aggregate_recomputes_as_descendants_recover() {
    let root = Monitor::new("root");
    let child = Monitor::new("child");
    root.add_submonitor(&child);
    root.set_status(Status::Ok, None);

    child.set_status(Status::Failed, None);
    assert_eq!(root.full_report().await.status, Status::Failed);

    child.set_status(Status::Ok, None);
    assert_eq!(root.full_report().await.status, Status::Ok);
}

/// Heartbeat and status streams are independent: heartbeats keep flowing
/// while the status stays unchanged, and a status change publishes without
/// waiting for the next heartbeat tick.
#[tokio::test]
async fn heartbeat_and_status_streams_are_independent() {
    let sink = Arc::new(CollectingSink::new());
    let monitor = BusMonitor::new(
        "dome_follower.dev",
        Some(sink.clone() as Arc<dyn MessageSink>),
        BusMonitorOptions {
            heartbeat_interval: Duration::from_millis(40),
            healthcheck_interval: Duration::from_secs(60),
            ..BusMonitorOptions::default()
        },
    );
    monitor.set_status(Status::Ok, None);
    monitor.start_monitoring().await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    monitor.set_status(Status::Warning, Some("dome lagging"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    monitor.stop_monitoring().await;

    let subjects = sink.subjects();
    let heartbeats = subjects.iter().filter(|s| s.starts_with("svc.heartbeat.")).count();
    let statuses = subjects.iter().filter(|s| s.starts_with("svc.status.")).count();
    assert!(heartbeats >= 3, "heartbeats: {heartbeats}");
    assert!(statuses >= 1, "statuses: {statuses}");

    // Latest status report carries the change.
    let last_status = sink
        .messages()
        .into_iter()
        .filter(|(subject, _)| subject.starts_with("svc.status."))
        .last()
        .unwrap()
        .1;
    assert_eq!(last_status["status"], "warning");
    assert_eq!(last_status["message"], "dome lagging");
}
