// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection management and stream provisioning.

use crate::subjects::StreamKind;
use crate::BusError;
use async_nats::jetstream;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 4222;

/// Retention for the status stream.
const STATUS_MAX_AGE: Duration = Duration::from_secs(24 * 3600);
/// Retention for the heartbeat stream; comfortably above the 10 min floor.
const HEARTBEAT_MAX_AGE: Duration = Duration::from_secs(15 * 60);
/// Message-count guard on the registry stream, which otherwise keeps history.
const REGISTRY_MAX_MSGS: i64 = 1_000_000;

/// Interval between attempts when a required bus is unreachable.
const REQUIRED_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// An open NATS connection with a JetStream context.
pub struct Bus {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    host: String,
    port: u16,
}

impl Bus {
    /// Connect with a bounded timeout. Fails when the server is unreachable.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, BusError> {
        let url = format!("nats://{host}:{port}");
        tracing::debug!(url = %url, "connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(&url)
            .await
            .map_err(|e| BusError::Connect { url: url.clone(), source: Box::new(e) })?;

        tracing::info!(url = %url, "connected to NATS");
        let jetstream = jetstream::new(client.clone());
        Ok(Self { client, jetstream, host: host.to_string(), port })
    }

    /// Connect, retrying until the server becomes reachable.
    ///
    /// Used when the configuration marks the bus as required; intended for
    /// deployments where services must outwait a bus restart.
    pub async fn connect_required(host: &str, port: u16) -> Self {
        loop {
            match Self::connect(host, port, REQUIRED_RETRY_INTERVAL).await {
                Ok(bus) => return bus,
                Err(e) => {
                    tracing::warn!(host, port, error = %e, "NATS required but unreachable, retrying");
                    tokio::time::sleep(REQUIRED_RETRY_INTERVAL).await;
                }
            }
        }
    }

    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Create the registry/status/heartbeat streams for a subject prefix if
    /// they do not exist yet.
    pub async fn ensure_streams(&self, prefix: &str) -> Result<(), BusError> {
        for kind in StreamKind::all() {
            let name = kind.stream_name(prefix);
            let mut config = jetstream::stream::Config {
                name: name.clone(),
                subjects: vec![kind.wildcard(prefix)],
                retention: jetstream::stream::RetentionPolicy::Limits,
                discard: jetstream::stream::DiscardPolicy::Old,
                ..Default::default()
            };
            match kind {
                StreamKind::Registry => config.max_messages = REGISTRY_MAX_MSGS,
                StreamKind::Status => config.max_age = STATUS_MAX_AGE,
                StreamKind::Heartbeat => config.max_age = HEARTBEAT_MAX_AGE,
            }

            self.jetstream
                .get_or_create_stream(config)
                .await
                .map_err(|e| BusError::Stream { stream: name.clone(), message: e.to_string() })?;
            tracing::debug!(stream = %name, "JetStream stream ready");
        }
        Ok(())
    }

    /// Publish a JSON payload and wait for the JetStream acknowledgement.
    pub async fn publish_json<T: Serialize>(
        &self,
        subject: String,
        payload: &T,
    ) -> Result<(), BusError> {
        let bytes = serde_json::to_vec(payload)?;
        let ack = self
            .jetstream
            .publish(subject.clone(), bytes.into())
            .await
            .map_err(|e| BusError::Publish { subject: subject.clone(), message: e.to_string() })?;
        ack.await
            .map_err(|e| BusError::Publish { subject, message: e.to_string() })?;
        Ok(())
    }

    /// Flush buffered messages before the connection is dropped.
    pub async fn close(&self) {
        if let Err(e) = self.client.flush().await {
            tracing::debug!(error = %e, "flush on close failed");
        }
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus").field("host", &self.host).field("port", &self.port).finish()
    }
}
