// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use serial_test::serial;
use std::io::Write;

async fn fresh_context(options: ContextOptions) -> Arc<ProcessContext> {
    if let Some(existing) = ProcessContext::current() {
        existing.shutdown().await;
    }
    ProcessContext::initialize(options).await.unwrap()
}

#[yare::parameterized(
    integer        = { json!(4222), Some(4222) },
    numeric_string = { json!("4222"), Some(4222) },
    padded_string  = { json!(" 4222 "), Some(4222) },
    word           = { json!("not-a-port"), None },
    float          = { json!(42.5), None },
    list           = { json!([4222]), None },
    out_of_range   = { json!(70000), None },
)]
fn port_parsing(value: serde_json::Value, expected: Option<u16>) {
    match (parse_port(&value), expected) {
        (Ok(port), Some(want)) => assert_eq!(port, want),
        (Err(ContextError::InvalidPort(_)), None) => {}
        (result, want) => panic!("got {result:?}, wanted {want:?}"),
    }
}

#[tokio::test]
#[serial]
async fn initialize_returns_existing_instance() {
    let first = fresh_context(ContextOptions::default()).await;
    let second = ProcessContext::initialize(ContextOptions::default()).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    first.shutdown().await;
    assert!(ProcessContext::current().is_none());
}

#[tokio::test]
#[serial]
async fn shutdown_allows_reinitialization() {
    let first = fresh_context(ContextOptions::default()).await;
    first.shutdown().await;
    let second = fresh_context(ContextOptions::default()).await;
    assert!(!Arc::ptr_eq(&first, &second));
    second.shutdown().await;
}

#[tokio::test]
#[serial]
async fn config_file_feeds_the_config_manager() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "nats:\n  host: 127.0.0.1\n  port: 4222\n  required: false\nbanner: tcs\n")
        .unwrap();

    let context = fresh_context(ContextOptions {
        config_file: Some(file.path().to_path_buf()),
        args_overlay: None,
    })
    .await;

    let global = context.config_manager().resolve_config(None).await;
    assert_eq!(global["banner"], "tcs");
    assert_eq!(context.config_file(), Some(file.path()));
    context.shutdown().await;
}

#[tokio::test]
#[serial]
async fn invalid_configured_port_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "nats:\n  host: localhost\n  port: not-a-port\n").unwrap();

    if let Some(existing) = ProcessContext::current() {
        existing.shutdown().await;
    }
    let result = ProcessContext::initialize(ContextOptions {
        config_file: Some(file.path().to_path_buf()),
        args_overlay: None,
    })
    .await;
    assert!(matches!(result, Err(ContextError::InvalidPort(_))));
}

#[tokio::test]
#[serial]
async fn args_overlay_wins_over_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "banner: from-file\n").unwrap();

    let context = fresh_context(ContextOptions {
        config_file: Some(file.path().to_path_buf()),
        args_overlay: Some(json!({"banner": "from-args"})),
    })
    .await;
    let global = context.config_manager().resolve_config(None).await;
    assert_eq!(global["banner"], "from-args");
    context.shutdown().await;
}

#[tokio::test]
#[serial]
async fn config_cache_round_trips() {
    let context = fresh_context(ContextOptions::default()).await;
    context.cache_config("tic", json!({"telescope": "jk15"}));
    assert_eq!(context.cached_config("tic").unwrap()["telescope"], "jk15");
    context.clear_config_cache();
    assert!(context.cached_config("tic").is_none());
    context.shutdown().await;
}
