// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle-event ordering invariants over whole supervised runs.

use serial_test::serial;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tcs_bus::{CollectingSink, MessageSink};
use tcs_core::{RestartPolicy, ServiceId};
use tcs_runtime::{ContextOptions, ProcessContext, ServiceCatalog, ServiceRegistry};
use tcs_supervisor::runner::{InProcessRunner, Runner, RunnerConfig};
use tcs_supervisor::RestartSettings;

async fn test_context(config: &str) -> Arc<ProcessContext> {
    if let Some(existing) = ProcessContext::current() {
        existing.shutdown().await;
    }
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{config}").unwrap();
    let (_, path) = file.keep().unwrap();
    ProcessContext::initialize(ContextOptions { config_file: Some(path), args_overlay: None })
        .await
        .unwrap()
}

fn event_kinds(sink: &CollectingSink) -> Vec<String> {
    sink.messages()
        .into_iter()
        .filter_map(|(subject, _)| {
            subject
                .strip_prefix("svc.registry.")
                .map(|rest| rest.split('.').next().unwrap_or_default().to_string())
        })
        .collect()
}

/// Over any execution, the registry sequence begins with `declared`,
/// contains at most one `start` without an intervening terminal event, and
/// ends with `stop` or `failed`.
fn assert_well_formed_sequence(kinds: &[String]) {
    assert_eq!(kinds.first().map(String::as_str), Some("declared"), "sequence: {kinds:?}");
    let last = kinds.last().map(String::as_str);
    assert!(
        last == Some("stop") || last == Some("failed"),
        "terminal event missing: {kinds:?}"
    );

    let mut live = false;
    for kind in kinds {
        match kind.as_str() {
            "start" => {
                assert!(!live, "start without intervening terminal event: {kinds:?}");
                live = true;
            }
            "stop" | "crashed" | "failed" => live = false,
            _ => {}
        }
    }
}

async fn wait_for_kind(sink: &CollectingSink, kind: &str, deadline: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < deadline {
        if event_kinds(sink).iter().any(|k| k == kind) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

fn runner_for(
    context: &Arc<ProcessContext>,
    service_id: &str,
    restart: RestartSettings,
    sink: &Arc<CollectingSink>,
) -> InProcessRunner {
    InProcessRunner::new(
        RunnerConfig {
            service_id: ServiceId::parse(service_id).unwrap(),
            config_file: context.config_file().map(Into::into),
            runner_id: Some(format!("launcher.specs.{service_id}")),
            parent_name: Some("launcher.specs".to_string()),
            restart,
        },
        Arc::clone(context),
        ServiceRegistry::new(),
        ServiceCatalog::builtin(),
        Some(Arc::clone(sink) as Arc<dyn MessageSink>),
        "svc",
    )
}

#[tokio::test]
#[serial]
async fn crashing_run_produces_a_well_formed_event_sequence() {
    let context = test_context(
        "services:\n  - type: mock_crashing\n    variant: spec\n    crash_delay: 0.02\n",
    )
    .await;
    let sink = Arc::new(CollectingSink::new());
    let runner = runner_for(
        &context,
        "mock_crashing.spec",
        RestartSettings {
            policy: RestartPolicy::Always,
            delay: Duration::from_millis(20),
            max: 3,
            window: Duration::from_secs(60),
        },
        &sink,
    );

    runner.publish_declared().await;
    runner.start().await.unwrap();
    assert!(wait_for_kind(&sink, "failed", Duration::from_secs(15)).await);

    let kinds = event_kinds(&sink);
    assert_well_formed_sequence(&kinds);

    // Exactly `max` restarting events over the whole run.
    let restarting = kinds.iter().filter(|k| *k == "restarting").count();
    assert_eq!(restarting, 3, "sequence: {kinds:?}");

    context.shutdown().await;
}

#[tokio::test]
#[serial]
async fn clean_run_produces_a_well_formed_event_sequence() {
    let context = test_context(
        "services:\n  - type: mock_oneshot\n    variant: spec\n    work_delay: 0.02\n",
    )
    .await;
    let sink = Arc::new(CollectingSink::new());
    let runner = runner_for(&context, "mock_oneshot.spec", RestartSettings::default(), &sink);

    runner.publish_declared().await;
    runner.start().await.unwrap();
    assert!(wait_for_kind(&sink, "stop", Duration::from_secs(10)).await);

    assert_well_formed_sequence(&event_kinds(&sink));
    context.shutdown().await;
}
