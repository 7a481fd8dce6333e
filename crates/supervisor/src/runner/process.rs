// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess runner: spawns `tcs-service`, forwards its logs, watches for
//! exit, and applies the restart policy.

use super::{EventPublisher, Runner, RunnerConfig, RunnerError, RunnerStatus};
use crate::policy::{evaluate_crash, RestartTracker};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tcs_bus::MessageSink;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Interval at which a graceful stop polls for child exit.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Pause between stop and start on an explicit restart.
const RESTART_PAUSE: Duration = Duration::from_millis(500);

/// Environment override for the service binary location.
pub const SERVICE_BINARY_ENV: &str = "TCS_SERVICE_BINARY";

fn resolve_service_binary() -> PathBuf {
    if let Ok(path) = std::env::var(SERVICE_BINARY_ENV) {
        return PathBuf::from(path);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join("tcs-service");
            if candidate.exists() {
                return candidate;
            }
        }
    }
    PathBuf::from("tcs-service")
}

fn exit_code_from(status: std::process::ExitStatus) -> i32 {
    // Signal deaths map to negative codes so `on-abnormal` can see them.
    status.code().unwrap_or_else(|| status.signal().map(|s| -s).unwrap_or(-1))
}

struct ProcState {
    running: bool,
    stopping: bool,
    force_killed: bool,
    pid: Option<u32>,
    start_time: Option<DateTime<Utc>>,
    exit_rx: Option<watch::Receiver<Option<i32>>>,
    watcher: Option<JoinHandle<()>>,
    log_task: Option<JoinHandle<()>>,
    tracker: RestartTracker,
    run_token: Option<CancellationToken>,
}

struct ProcInner {
    config: RunnerConfig,
    events: EventPublisher,
    terminate_delay: Duration,
    service_binary: PathBuf,
    state: Mutex<ProcState>,
}

/// Runner that manages a service in a subprocess.
pub struct ProcessRunner {
    inner: Arc<ProcInner>,
}

impl ProcessRunner {
    pub fn new(
        config: RunnerConfig,
        sink: Option<Arc<dyn MessageSink>>,
        subject_prefix: &str,
        terminate_delay: Duration,
    ) -> Self {
        let events = EventPublisher::new(sink, subject_prefix, &config);
        Self {
            inner: Arc::new(ProcInner {
                config,
                events,
                terminate_delay,
                service_binary: resolve_service_binary(),
                state: Mutex::new(ProcState {
                    running: false,
                    stopping: false,
                    force_killed: false,
                    pid: None,
                    start_time: None,
                    exit_rx: None,
                    watcher: None,
                    log_task: None,
                    tracker: RestartTracker::new(),
                    run_token: None,
                }),
            }),
        }
    }
}

impl ProcInner {
    fn service_id(&self) -> String {
        self.config.service_id.to_string()
    }

    async fn start_impl(self: &Arc<Self>) -> Result<(), RunnerError> {
        if self.state.lock().running {
            tracing::warn!(service_id = %self.service_id(), "service already running");
            return Err(RunnerError::AlreadyRunning(self.service_id()));
        }

        let mut command = Command::new(&self.service_binary);
        command.arg(self.config.service_id.service_type());
        if let Some(config_file) = &self.config.config_file {
            let absolute = std::path::absolute(config_file)
                .unwrap_or_else(|_| config_file.clone());
            command.arg(absolute);
        }
        command.arg(self.config.service_id.variant());
        if let Some(runner_id) = &self.config.runner_id {
            command.args(["--runner-id", runner_id]);
        }
        if let Some(parent) = &self.config.parent_name {
            command.args(["--parent-name", parent]);
        }
        // The launcher already printed a banner.
        command.arg("--no-banner");
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        tracing::info!(
            service_id = %self.service_id(),
            binary = %self.service_binary.display(),
            "starting service subprocess"
        );
        let mut child = command.spawn().map_err(|e| {
            tracing::error!(service_id = %self.service_id(), error = %e, "spawn failed");
            RunnerError::SpawnFailed { service_id: self.service_id(), message: e.to_string() }
        })?;
        let pid = child.id().unwrap_or_default();

        let log_task = child.stderr.take().map(|stderr| {
            let service_id = self.service_id();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::info!(service = %service_id, "{}", line.trim_end());
                }
            })
        });

        let (exit_tx, exit_rx) = watch::channel(None);
        let run_token = CancellationToken::new();
        {
            let mut state = self.state.lock();
            state.running = true;
            state.stopping = false;
            state.force_killed = false;
            state.pid = Some(pid);
            state.start_time = Some(Utc::now());
            state.exit_rx = Some(exit_rx);
            state.log_task = log_task;
            state.run_token = Some(run_token);
        }
        let watcher = tokio::spawn(Self::watch_child(Arc::clone(self), child, exit_tx));
        self.state.lock().watcher = Some(watcher);

        tracing::info!(service_id = %self.service_id(), pid, "service started");
        self.events.start(pid).await;
        Ok(())
    }

    /// Blocks on child exit for immediate crash detection, then routes the
    /// exit through the restart decision. The exit notification is sent only
    /// after handling completes so `stop()` can rely on event ordering.
    async fn watch_child(inner: Arc<Self>, mut child: Child, exit_tx: watch::Sender<Option<i32>>) {
        let exit_code = match child.wait().await {
            Ok(status) => exit_code_from(status),
            Err(e) => {
                tracing::error!(service_id = %inner.service_id(), error = %e, "wait on child failed");
                -1
            }
        };
        inner.handle_exit(exit_code).await;
        let _ = exit_tx.send(Some(exit_code));
    }

    async fn handle_exit(self: &Arc<Self>, exit_code: i32) {
        // Capture and clear the handle state atomically so the stop path
        // never signals a dead pid.
        let stopping = {
            let mut state = self.state.lock();
            state.pid = None;
            state.stopping
        };

        if stopping {
            let force_killed = self.state.lock().force_killed;
            if !force_killed {
                self.events.stop("completed", exit_code).await;
            }
            self.state.lock().running = false;
            return;
        }

        if exit_code == 0 {
            tracing::info!(service_id = %self.service_id(), "service exited cleanly");
            self.events.stop("completed", 0).await;
            self.state.lock().running = false;
            return;
        }

        tracing::warn!(
            service_id = %self.service_id(),
            exit_code,
            "service exited unexpectedly"
        );
        let verdict = {
            let mut state = self.state.lock();
            evaluate_crash(&self.config.restart, &mut state.tracker, exit_code, Instant::now())
        };
        self.events.crashed(exit_code, verdict.will_restart()).await;

        if !verdict.policy_wants {
            tracing::info!(service_id = %self.service_id(), "no restart per policy");
            self.state.lock().running = false;
            return;
        }
        if verdict.limit_reached {
            tracing::error!(
                service_id = %self.service_id(),
                max = self.config.restart.max,
                window_secs = self.config.restart.window.as_secs_f64(),
                "restart limit reached, giving up"
            );
            self.events.failed("restart_limit_reached", verdict.restart_count).await;
            self.state.lock().running = false;
            return;
        }

        // Restart delay, abandoned if an explicit stop arrives.
        let run_token = self.state.lock().run_token.clone();
        if let Some(token) = run_token {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!(service_id = %self.service_id(), "pending restart abandoned");
                    self.state.lock().running = false;
                    return;
                }
                _ = tokio::time::sleep(self.config.restart.delay) => {}
            }
        } else {
            tokio::time::sleep(self.config.restart.delay).await;
        }

        let attempt = verdict.restart_count + 1;
        let max_restarts = (self.config.restart.max > 0).then_some(self.config.restart.max);
        self.events.restarting(attempt, max_restarts).await;
        tracing::info!(service_id = %self.service_id(), attempt, "restarting service");

        self.state.lock().running = false;
        match self.start_impl().await {
            Ok(()) => {
                self.state.lock().tracker.record(Instant::now());
            }
            Err(e) => {
                tracing::error!(service_id = %self.service_id(), error = %e, "restart failed, giving up");
                self.events.failed("restart_failed", verdict.restart_count).await;
            }
        }
    }

    async fn stop_impl(&self) -> Result<(), RunnerError> {
        let (pid, exit_rx, run_token) = {
            let mut state = self.state.lock();
            if !state.running {
                tracing::warn!(service_id = %self.service_id(), "service not running");
                return Err(RunnerError::NotRunning(self.service_id()));
            }
            state.stopping = true;
            (state.pid, state.exit_rx.clone(), state.run_token.clone())
        };

        // Abandon a pending restart sleep, if any.
        if let Some(token) = run_token {
            token.cancel();
        }

        if let Some(pid) = pid {
            tracing::info!(service_id = %self.service_id(), pid, "stopping service");
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::debug!(service_id = %self.service_id(), error = %e, "SIGTERM delivery failed");
            }

            let deadline = tokio::time::Instant::now() + self.terminate_delay;
            let exited = loop {
                if exit_rx.as_ref().is_some_and(|rx| rx.borrow().is_some()) {
                    break true;
                }
                if tokio::time::Instant::now() >= deadline {
                    break false;
                }
                tokio::time::sleep(STOP_POLL_INTERVAL).await;
            };

            if !exited {
                tracing::warn!(
                    service_id = %self.service_id(),
                    delay_secs = self.terminate_delay.as_secs_f64(),
                    "did not terminate in time, force killing"
                );
                self.state.lock().force_killed = true;
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
                self.events.stop("force_killed", -(Signal::SIGKILL as i32)).await;
            }
        }

        let watcher = self.state.lock().watcher.take();
        if let Some(watcher) = watcher {
            if tokio::time::timeout(Duration::from_secs(2), watcher).await.is_err() {
                tracing::warn!(service_id = %self.service_id(), "exit watcher did not settle");
            }
        }
        let log_task = self.state.lock().log_task.take();
        if let Some(task) = log_task {
            task.abort();
        }

        {
            let mut state = self.state.lock();
            state.running = false;
            state.stopping = false;
            state.force_killed = false;
            state.pid = None;
            state.start_time = None;
            state.exit_rx = None;
            state.run_token = None;
        }
        tracing::info!(service_id = %self.service_id(), "service stopped");
        Ok(())
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    fn config(&self) -> &RunnerConfig {
        &self.inner.config
    }

    fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    async fn start(&self) -> Result<(), RunnerError> {
        self.inner.start_impl().await
    }

    async fn stop(&self) -> Result<(), RunnerError> {
        self.inner.stop_impl().await
    }

    async fn restart(&self) -> Result<(), RunnerError> {
        self.inner.stop_impl().await?;
        tokio::time::sleep(RESTART_PAUSE).await;
        self.inner.start_impl().await
    }

    fn status(&self) -> RunnerStatus {
        let state = self.inner.state.lock();
        let uptime = state
            .start_time
            .map(|start| (Utc::now() - start).num_milliseconds() as f64 / 1000.0);
        RunnerStatus {
            service_id: self.inner.service_id(),
            running: state.running,
            pid: state.pid,
            start_time: state.start_time,
            uptime_seconds: uptime,
        }
    }

    async fn publish_declared(&self) {
        self.inner.events.declared().await;
    }
}
