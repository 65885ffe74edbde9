//! Configuration types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sieve::Encoding;

/// Default grace period between the graceful signal and the group kill.
pub const DEFAULT_CLEANUP_TIMEOUT_MS: u64 = 500;

/// Signal sent to the direct child when closing it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GracefulSignal {
    #[default]
    #[serde(rename = "SIGTERM", alias = "TERM", alias = "term")]
    Term,
    #[serde(rename = "SIGINT", alias = "INT", alias = "int")]
    Int,
    #[serde(rename = "SIGHUP", alias = "HUP", alias = "hup")]
    Hup,
}

impl GracefulSignal {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Term => "SIGTERM",
            Self::Int => "SIGINT",
            Self::Hup => "SIGHUP",
        }
    }
}

impl fmt::Display for GracefulSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GracefulSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        match upper.strip_prefix("SIG").unwrap_or(&upper) {
            "TERM" => Ok(Self::Term),
            "INT" => Ok(Self::Int),
            "HUP" => Ok(Self::Hup),
            _ => Err(format!("Unsupported graceful signal: {s}")),
        }
    }
}

/// Configuration for a supervised child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Text encoding of the child's stdio.
    pub encoding: Encoding,
    /// Kill the child's process group when this process terminates.
    pub kill_on_exit: bool,
    /// Milliseconds to wait after the graceful signal before the group kill.
    pub cleanup_timeout_ms: u64,
    /// Run the command line through `/bin/sh -c`.
    pub shell: bool,
    /// Working directory; the current directory when unset.
    pub cwd: Option<PathBuf>,
    /// Signal sent to the direct child by `close`.
    pub graceful_signal: GracefulSignal,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Utf8,
            kill_on_exit: true,
            cleanup_timeout_ms: DEFAULT_CLEANUP_TIMEOUT_MS,
            shell: true,
            cwd: None,
            graceful_signal: GracefulSignal::Term,
        }
    }
}

impl SupervisorConfig {
    #[must_use]
    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_millis(self.cleanup_timeout_ms)
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub fn with_kill_on_exit(mut self, kill_on_exit: bool) -> Self {
        self.kill_on_exit = kill_on_exit;
        self
    }

    #[must_use]
    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }

    #[must_use]
    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_graceful_signal(mut self, signal: GracefulSignal) -> Self {
        self.graceful_signal = signal;
        self
    }
}
