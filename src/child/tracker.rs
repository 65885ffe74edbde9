//! Exit synchronization across process exit and stream end notifications.

use super::ExitInfo;

/// Which child output stream a notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pipe {
    Stdout,
    Stderr,
}

/// Tracks the three conditions gating the public `Exit` event.
///
/// Notifications may arrive in any order and more than once; the tracker
/// reports finalization exactly once, the first time all three hold.
#[derive(Debug, Default)]
pub(crate) struct ExitTracker {
    exited: Option<ExitInfo>,
    stdout_ended: bool,
    stderr_ended: bool,
    finalized: bool,
}

impl ExitTracker {
    pub(crate) fn child_exited(&mut self, info: ExitInfo) {
        if self.exited.is_none() {
            self.exited = Some(info);
        }
    }

    pub(crate) fn stream_ended(&mut self, pipe: Pipe) {
        match pipe {
            Pipe::Stdout => self.stdout_ended = true,
            Pipe::Stderr => self.stderr_ended = true,
        }
    }

    pub(crate) fn has_exited(&self) -> bool {
        self.exited.is_some()
    }

    pub(crate) fn streams_ended(&self) -> bool {
        self.stdout_ended && self.stderr_ended
    }

    /// Returns the exit info on the single transition to finalized.
    pub(crate) fn try_finalize(&mut self) -> Option<ExitInfo> {
        if self.finalized || !self.streams_ended() {
            return None;
        }
        let info = self.exited?;
        self.finalized = true;
        Some(info)
    }
}
