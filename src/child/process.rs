//! Spawning and controlling a supervised child process.
//!
//! The child always leads its own process group, so its pid doubles as the
//! group id and the whole subtree can be killed with one signal.

use std::process::Stdio;
use std::sync::Arc;

use nix::sys::signal::Signal;
use serde::Serialize;
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, watch, Mutex};

use super::driver::Driver;
use super::signal::{kill_group, signal_child};
use super::{cleanup, ChildEvent, ChildEvents, ChildState, ExitInfo, SendError, SpawnError};
use crate::config::SupervisorConfig;
use crate::sieve::{write_json_line, Decoder, FrameError, StreamSieve};

/// Shell used when `shell` is enabled.
const SHELL: &str = "/bin/sh";

/// A running child process with line-delimited JSON over its stdio.
#[derive(Debug)]
pub struct SupervisedChild {
    pid: u32,
    config: SupervisorConfig,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    events: Option<ChildEvents>,
    state: watch::Receiver<ChildState>,
    finalized: watch::Receiver<Option<ExitInfo>>,
}

impl SupervisedChild {
    /// Spawn `command_line` as the leader of a new process group.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the command line is empty, the OS refuses to
    /// launch it, or the child exposes no pid or pipes.
    pub fn spawn(command_line: &str, config: SupervisorConfig) -> Result<Self, SpawnError> {
        let mut cmd = build_command(command_line, &config)?;
        let mut child = cmd.spawn().map_err(|source| SpawnError::Io {
            command: command_line.to_string(),
            source,
        })?;

        let pid = child
            .id()
            .ok_or_else(|| SpawnError::MissingPid(command_line.to_string()))?;
        let missing = |stream| SpawnError::MissingPipe {
            command: command_line.to_string(),
            stream,
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        if config.kill_on_exit {
            cleanup::register(pid);
        }
        tracing::debug!(pid, command = command_line, shell = config.shell, "Spawned child");

        let stdin = Arc::new(Mutex::new(Some(stdin)));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChildState::Running);
        let (finalized_tx, finalized_rx) = watch::channel(None);

        Driver {
            pid,
            child,
            sieve: StreamSieve::with_encoding(config.encoding),
            stderr_decoder: Decoder::new(config.encoding),
            stdin: Arc::clone(&stdin),
            events: event_tx,
            state: state_tx,
            finalized: finalized_tx,
            registered: config.kill_on_exit,
        }
        .start(stdout, stderr);

        Ok(Self {
            pid,
            config,
            stdin,
            events: Some(ChildEvents::new(event_rx)),
            state: state_rx,
            finalized: finalized_rx,
        })
    }

    /// Process id, which is also the process group id.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// State of the child process itself.
    #[must_use]
    pub fn state(&self) -> ChildState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Exit info once the exit has been synchronized with all output.
    #[must_use]
    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.finalized.borrow()
    }

    /// Take ownership of the event receiver.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_events(&mut self) -> Option<ChildEvents> {
        self.events.take()
    }

    /// Receive the next event, or `None` once `Exit` has been delivered or
    /// the receiver was taken.
    pub async fn recv(&mut self) -> Option<ChildEvent> {
        match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => None,
        }
    }

    /// Send a value to the child as one line of compact JSON.
    ///
    /// # Errors
    ///
    /// Returns `SendError::NotRunning` if the child has exited, or
    /// `SendError::Frame` if serialization or the write fails.
    pub async fn send<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), SendError> {
        if !self.is_running() {
            return Err(SendError::NotRunning { pid: self.pid });
        }
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or(SendError::NotRunning { pid: self.pid })?;

        let result = match write_json_line(stdin, value).await {
            Err(FrameError::Io(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                Err(SendError::NotRunning { pid: self.pid })
            }
            result => result.map_err(SendError::from),
        };
        if !self.is_running() {
            guard.take();
        }
        result
    }

    /// Gracefully terminate the child and wait for its synchronized exit.
    ///
    /// The configured graceful signal goes to the child alone. If the exit
    /// is not synchronized within the cleanup timeout, the whole process
    /// group is killed with SIGKILL. Returns `None` only if supervision
    /// stopped before the exit was observed.
    pub async fn close(&self) -> Option<ExitInfo> {
        self.begin_close();
        self.wait().await
    }

    /// Start closing the child and invoke `callback` on its synchronized exit.
    pub fn close_with<F>(&self, callback: F)
    where
        F: FnOnce(ExitInfo) + Send + 'static,
    {
        self.begin_close();
        let mut finalized = self.finalized.clone();
        tokio::spawn(async move {
            if let Some(info) = wait_finalized(&mut finalized).await {
                callback(info);
            }
        });
    }

    /// Wait for the synchronized exit without signalling the child.
    pub async fn wait(&self) -> Option<ExitInfo> {
        let mut finalized = self.finalized.clone();
        wait_finalized(&mut finalized).await
    }

    fn begin_close(&self) {
        let pid = self.pid;
        if self.is_running() {
            signal_child(pid, Signal::from(self.config.graceful_signal));
        } else {
            tracing::debug!(pid, "Child already exited, skipping graceful signal");
        }

        let timeout = self.config.cleanup_timeout();
        let finalized = self.finalized.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if finalized.borrow().is_none() {
                tracing::debug!(
                    pid,
                    timeout_ms = timeout.as_millis(),
                    "Child did not exit in time, killing process group"
                );
                kill_group(pid);
            }
        });
    }
}

async fn wait_finalized(finalized: &mut watch::Receiver<Option<ExitInfo>>) -> Option<ExitInfo> {
    finalized
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|info| *info)
}

fn build_command(command_line: &str, config: &SupervisorConfig) -> Result<Command, SpawnError> {
    let trimmed = command_line.trim();
    if trimmed.is_empty() {
        return Err(SpawnError::EmptyCommandLine);
    }

    let mut cmd = if config.shell {
        let mut cmd = Command::new(SHELL);
        cmd.arg("-c").arg(command_line);
        cmd
    } else {
        let mut parts = trimmed.split_whitespace();
        let program = parts.next().ok_or(SpawnError::EmptyCommandLine)?;
        let mut cmd = Command::new(program);
        cmd.args(parts);
        cmd
    };

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(false);

    if let Some(ref dir) = config.cwd {
        cmd.current_dir(dir);
    }

    Ok(cmd)
}
