//! Per-child task multiplexing stdout, stderr, and process exit.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, watch, Mutex};

use super::cleanup;
use super::tracker::{ExitTracker, Pipe};
use super::{ChildEvent, ChildState, ExitInfo};
use crate::sieve::{Decoder, StreamSieve};

/// Read size for child output pipes.
const READ_CHUNK_SIZE: usize = 8192;

#[derive(Debug)]
enum PipeMessage {
    Data(Pipe, Vec<u8>),
    Ended(Pipe),
}

/// Forward raw chunks from one pipe, then report its end exactly once.
async fn pump<R>(pipe: Pipe, mut reader: R, tx: mpsc::UnboundedSender<PipeMessage>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(PipeMessage::Data(pipe, buf[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!(?pipe, error = %e, "Child pipe read failed, treating as end");
                break;
            }
        }
    }
    let _ = tx.send(PipeMessage::Ended(pipe));
}

/// Everything the driver task owns for one child.
pub(crate) struct Driver {
    pub(crate) pid: u32,
    pub(crate) child: Child,
    pub(crate) sieve: StreamSieve,
    pub(crate) stderr_decoder: Decoder,
    pub(crate) stdin: Arc<Mutex<Option<ChildStdin>>>,
    pub(crate) events: mpsc::UnboundedSender<ChildEvent>,
    pub(crate) state: watch::Sender<ChildState>,
    pub(crate) finalized: watch::Sender<Option<ExitInfo>>,
    pub(crate) registered: bool,
}

impl Driver {
    /// Start pumping both pipes and drive the child until its exit is
    /// synchronized.
    pub(crate) fn start<O, E>(self, stdout: O, stderr: E)
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let (pipe_tx, pipe_rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(Pipe::Stdout, stdout, pipe_tx.clone()));
        tokio::spawn(pump(Pipe::Stderr, stderr, pipe_tx));
        tokio::spawn(self.run(pipe_rx));
    }

    async fn run(mut self, mut pipes: mpsc::UnboundedReceiver<PipeMessage>) {
        let mut tracker = ExitTracker::default();

        loop {
            tokio::select! {
                message = pipes.recv(), if !tracker.streams_ended() => match message {
                    Some(PipeMessage::Data(Pipe::Stdout, bytes)) => {
                        for event in self.sieve.observe_bytes(&bytes) {
                            self.emit(event.into());
                        }
                    }
                    Some(PipeMessage::Data(Pipe::Stderr, bytes)) => {
                        let text = self.stderr_decoder.decode(&bytes);
                        if !text.is_empty() {
                            self.emit(ChildEvent::StderrData(text));
                        }
                    }
                    Some(PipeMessage::Ended(pipe)) => {
                        if pipe == Pipe::Stderr {
                            let tail = self.stderr_decoder.finish();
                            if !tail.is_empty() {
                                self.emit(ChildEvent::StderrData(tail));
                            }
                        }
                        tracker.stream_ended(pipe);
                    }
                    None => {
                        tracker.stream_ended(Pipe::Stdout);
                        tracker.stream_ended(Pipe::Stderr);
                    }
                },
                status = self.child.wait(), if !tracker.has_exited() => {
                    let info = match status {
                        Ok(status) => ExitInfo::from(status),
                        Err(e) => {
                            tracing::warn!(pid = self.pid, error = %e, "Failed to wait for child");
                            ExitInfo::default()
                        }
                    };
                    tracing::debug!(pid = self.pid, ?info, "Child process exited");
                    self.state.send_replace(ChildState::Exited(info));
                    // A blocked send holds the lock; it drops stdin itself
                    // once its write returns.
                    if let Ok(mut stdin) = self.stdin.try_lock() {
                        stdin.take();
                    }
                    tracker.child_exited(info);
                }
            }

            if let Some(info) = tracker.try_finalize() {
                self.finalize(info);
                return;
            }
        }
    }

    /// Flush the sieve, then publish `Exit` as the last event.
    fn finalize(&mut self, info: ExitInfo) {
        if let Some(event) = self.sieve.close() {
            self.emit(event.into());
        }
        if self.registered {
            cleanup::unregister(self.pid);
        }
        tracing::debug!(pid = self.pid, ?info, "Child exit synchronized");
        self.emit(ChildEvent::Exit(info));
        self.finalized.send_replace(Some(info));
    }

    fn emit(&self, event: ChildEvent) {
        // The caller may have dropped its receiver; supervision continues.
        let _ = self.events.send(event);
    }
}
