// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream readers: backlog drains and live follows.

use crate::{Bus, BusError};
use async_nats::jetstream::consumer::{pull, AckPolicy, Consumer, DeliverPolicy};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Where a reader starts on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFrom {
    /// All retained history.
    Beginning,
    /// Messages published at or after the given instant.
    Since(DateTime<Utc>),
    /// Latest retained message per subject, then everything new.
    LastPerSubject,
}

impl ReadFrom {
    fn deliver_policy(self) -> DeliverPolicy {
        match self {
            ReadFrom::Beginning => DeliverPolicy::All,
            ReadFrom::Since(dt) => DeliverPolicy::ByStartTime {
                start_time: time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
                    .unwrap_or(time::OffsetDateTime::UNIX_EPOCH),
            },
            ReadFrom::LastPerSubject => DeliverPolicy::LastPerSubject,
        }
    }
}

/// Batch size for backlog drains.
const DRAIN_BATCH: usize = 256;
/// How long a drain batch waits before concluding the backlog is exhausted.
const DRAIN_EXPIRES: Duration = Duration::from_millis(800);

impl Bus {
    async fn reader_consumer(
        &self,
        stream_name: &str,
        filter_subject: &str,
        from: ReadFrom,
    ) -> Result<Consumer<pull::Config>, BusError> {
        let stream = self.jetstream().get_stream(stream_name).await.map_err(|e| {
            BusError::Read { subject: filter_subject.to_string(), message: e.to_string() }
        })?;
        stream
            .create_consumer(pull::Config {
                deliver_policy: from.deliver_policy(),
                ack_policy: AckPolicy::None,
                filter_subject: filter_subject.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::Read {
                subject: filter_subject.to_string(),
                message: e.to_string(),
            })
    }

    /// Read the currently available backlog and return, without waiting for
    /// new messages. Malformed payloads are skipped with a debug log.
    pub async fn drain_backlog(
        &self,
        stream_name: &str,
        filter_subject: &str,
        from: ReadFrom,
    ) -> Result<Vec<Value>, BusError> {
        let consumer = self.reader_consumer(stream_name, filter_subject, from).await?;
        let mut collected = Vec::new();

        loop {
            let mut batch = consumer
                .fetch()
                .max_messages(DRAIN_BATCH)
                .expires(DRAIN_EXPIRES)
                .messages()
                .await
                .map_err(|e| BusError::Read {
                    subject: filter_subject.to_string(),
                    message: e.to_string(),
                })?;

            let mut count = 0usize;
            while let Some(message) = batch.next().await {
                let message = match message {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::debug!(subject = filter_subject, error = %e, "drain message error");
                        continue;
                    }
                };
                count += 1;
                match serde_json::from_slice::<Value>(&message.payload) {
                    Ok(value) => collected.push(value),
                    Err(e) => {
                        tracing::debug!(subject = %message.subject, error = %e, "skipping malformed payload");
                    }
                }
            }
            if count == 0 {
                break;
            }
        }

        tracing::debug!(subject = filter_subject, messages = collected.len(), "backlog drained");
        Ok(collected)
    }

    /// Follow a stream continuously, forwarding decoded payloads to a
    /// channel until the token is cancelled.
    pub async fn follow(
        &self,
        stream_name: &str,
        filter_subject: &str,
        from: ReadFrom,
        token: CancellationToken,
    ) -> Result<(mpsc::Receiver<Value>, JoinHandle<()>), BusError> {
        let consumer = self.reader_consumer(stream_name, filter_subject, from).await?;
        let mut messages = consumer.messages().await.map_err(|e| BusError::Read {
            subject: filter_subject.to_string(),
            message: e.to_string(),
        })?;

        let (tx, rx) = mpsc::channel(64);
        let subject = filter_subject.to_string();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = messages.next() => {
                        let Some(message) = next else { break };
                        let message = match message {
                            Ok(m) => m,
                            Err(e) => {
                                tracing::warn!(subject = %subject, error = %e, "follow reader error");
                                tokio::time::sleep(Duration::from_millis(200)).await;
                                continue;
                            }
                        };
                        match serde_json::from_slice::<Value>(&message.payload) {
                            Ok(value) => {
                                if tx.send(value).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!(subject = %message.subject, error = %e, "skipping malformed payload");
                            }
                        }
                    }
                }
            }
            tracing::debug!(subject = %subject, "follow reader stopped");
        });

        Ok((rx, handle))
    }
}
