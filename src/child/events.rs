//! Events emitted by a supervised child.

use std::pin::Pin;
use std::process::ExitStatus;
use std::task::{Context, Poll};

use futures_core::Stream;
use nix::sys::signal::Signal;
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::sieve::SieveEvent;

/// How the child process ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the child exited normally.
    pub code: Option<i32>,
    /// Terminating signal, if the child was killed by one.
    pub signal: Option<Signal>,
}

impl ExitInfo {
    /// Returns true if the child exited with code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Shell-style status: the exit code, or 128 plus the signal number.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal as i32,
            (None, None) => 1,
        }
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        Self {
            code: status.code(),
            signal: status.signal().and_then(|raw| Signal::try_from(raw).ok()),
        }
    }
}

/// Lifecycle state of the child process itself, independent of its streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChildState {
    #[default]
    Running,
    Exited(ExitInfo),
}

impl ChildState {
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Events from a supervised child, in per-stream order.
///
/// `Exit` is always the final event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildEvent {
    /// A complete non-JSON line from stdout.
    StdoutLine(String),
    /// A JSON object line from stdout.
    JsonObject(Map<String, Value>),
    /// A JSON array line from stdout.
    JsonArray(Vec<Value>),
    /// Unbuffered stderr data.
    StderrData(String),
    /// The child exited and all of its output has been delivered.
    Exit(ExitInfo),
}

impl ChildEvent {
    /// Returns true if this is the final `Exit` event.
    #[must_use]
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit(_))
    }
}

impl From<SieveEvent> for ChildEvent {
    fn from(event: SieveEvent) -> Self {
        match event {
            SieveEvent::RawLine(line) => Self::StdoutLine(line),
            SieveEvent::JsonObject(map) => Self::JsonObject(map),
            SieveEvent::JsonArray(items) => Self::JsonArray(items),
        }
    }
}

/// Receiving half of a child's event channel.
///
/// Usable directly through [`ChildEvents::recv`] or as a `Stream`.
#[derive(Debug)]
pub struct ChildEvents {
    inner: UnboundedReceiverStream<ChildEvent>,
}

impl ChildEvents {
    pub(crate) fn new(rx: UnboundedReceiver<ChildEvent>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// Receive the next event, or `None` after `Exit` has been delivered.
    pub async fn recv(&mut self) -> Option<ChildEvent> {
        self.inner.as_mut().recv().await
    }

    /// Drain every remaining event up to and including `Exit`.
    pub async fn collect_all(mut self) -> Vec<ChildEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for ChildEvents {
    type Item = ChildEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}
