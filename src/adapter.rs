//! Child-side half of the protocol.
//!
//! Wires any reader, typically this process's own stdin, into a
//! [`StreamSieve`] so a supervised program can consume LD-JSON commands the
//! same way its supervisor consumes its output.
//!
//! ```rust,no_run
//! use childsieve::adapter;
//! use childsieve::sieve::SieveEvent;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), childsieve::sieve::FrameError> {
//! let mut rx = adapter::from_stdin(adapter::DEFAULT_CHANNEL_BUFFER);
//! while let Some(event) = rx.recv().await {
//!     if let SieveEvent::JsonObject(obj) = event {
//!         adapter::send_stdout(&obj).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::sieve::{write_json_line, Encoding, FrameError, SieveEvent, StreamSieve};

/// Default capacity for adapter event channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 100;

const READ_CHUNK_SIZE: usize = 8192;

struct SieveReader<R> {
    reader: R,
    sieve: StreamSieve,
    pending: VecDeque<SieveEvent>,
    buf: Vec<u8>,
    eof: bool,
}

/// Classify everything read from `reader`, closing the sieve at end of data.
///
/// Read errors end the stream after flushing the trailing partial line.
pub fn sieve_events<R>(reader: R, encoding: Encoding) -> impl futures_core::Stream<Item = SieveEvent>
where
    R: AsyncRead + Unpin,
{
    let state = SieveReader {
        reader,
        sieve: StreamSieve::with_encoding(encoding),
        pending: VecDeque::new(),
        buf: vec![0u8; READ_CHUNK_SIZE],
        eof: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.eof {
                return None;
            }
            match state.reader.read(&mut state.buf).await {
                Ok(0) => {
                    state.eof = true;
                    state.pending.extend(state.sieve.close());
                }
                Ok(n) => {
                    let events = state.sieve.observe_bytes(&state.buf[..n]);
                    state.pending.extend(events);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Input read failed, closing sieve");
                    state.eof = true;
                    state.pending.extend(state.sieve.close());
                }
            }
        }
    })
}

/// Spawn a task feeding `reader` through a sieve into a bounded channel.
///
/// The channel closes after the final event once the reader is exhausted.
pub fn into_channel<R>(reader: R, encoding: Encoding, buffer: usize) -> mpsc::Receiver<SieveEvent>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    use futures_util::StreamExt;

    let (tx, rx) = mpsc::channel(buffer);
    tokio::spawn(async move {
        let events = sieve_events(reader, encoding);
        futures_util::pin_mut!(events);
        while let Some(event) = events.next().await {
            if tx.send(event).await.is_err() {
                tracing::debug!("Sieve channel receiver dropped");
                break;
            }
        }
    });
    rx
}

/// Sieve this process's stdin as UTF-8.
#[must_use]
pub fn from_stdin(buffer: usize) -> mpsc::Receiver<SieveEvent> {
    into_channel(tokio::io::stdin(), Encoding::Utf8, buffer)
}

/// Write a value to this process's stdout as one line of compact JSON.
///
/// # Errors
///
/// Returns `FrameError` if serialization or the write fails.
pub async fn send_stdout<T: Serialize + ?Sized>(value: &T) -> Result<(), FrameError> {
    let mut stdout = tokio::io::stdout();
    write_json_line(&mut stdout, value).await
}
