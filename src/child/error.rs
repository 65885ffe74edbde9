//! Supervisor error types.

use crate::sieve::FrameError;

/// Error type for spawning a supervised child.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The command line was empty or whitespace.
    #[error("Cannot spawn child process: empty command line")]
    EmptyCommandLine,
    /// The operating system refused to launch the command.
    #[error("Cannot spawn child process `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// The process launched but exposed no process id.
    #[error("Cannot spawn child process `{0}`: child did not have a process id")]
    MissingPid(String),
    /// A piped stdio handle was not available.
    #[error("Cannot spawn child process `{command}`: {stream} not piped")]
    MissingPipe {
        command: String,
        stream: &'static str,
    },
}

impl SpawnError {
    /// The underlying I/O error kind, if this came from the OS.
    #[must_use]
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// Error type for writing to a supervised child.
#[derive(thiserror::Error, Debug)]
pub enum SendError {
    /// The child has exited or its stdin is closed.
    #[error("Child process {pid} is not running")]
    NotRunning { pid: u32 },
    /// Serialization or pipe failure.
    #[error(transparent)]
    Frame(#[from] FrameError),
}
