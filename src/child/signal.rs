//! Signal delivery to a child and its process group.
//!
//! Delivery failures are logged and swallowed: the target may already be
//! gone, and termination is idempotent.

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

use crate::config::GracefulSignal;

impl From<GracefulSignal> for Signal {
    fn from(signal: GracefulSignal) -> Self {
        match signal {
            GracefulSignal::Term => Signal::SIGTERM,
            GracefulSignal::Int => Signal::SIGINT,
            GracefulSignal::Hup => Signal::SIGHUP,
        }
    }
}

/// Convert a child pid, refusing values that would address our own group
/// or every process.
fn target(pid: u32) -> Option<Pid> {
    i32::try_from(pid).ok().filter(|raw| *raw > 1).map(Pid::from_raw)
}

/// Send `signal` to the direct child only.
pub(crate) fn signal_child(pid: u32, signal: Signal) -> bool {
    let Some(target) = target(pid) else {
        return false;
    };
    match kill(target, signal) {
        Ok(()) => {
            tracing::debug!(pid, signal = ?signal, "Signalled child");
            true
        }
        Err(errno) => {
            tracing::debug!(pid, signal = ?signal, %errno, "Failed to signal child");
            false
        }
    }
}

/// Send SIGKILL to every process in the group led by `pgid`.
pub(crate) fn kill_group(pgid: u32) -> bool {
    let Some(target) = target(pgid) else {
        return false;
    };
    match killpg(target, Signal::SIGKILL) {
        Ok(()) => {
            tracing::debug!(pgid, "Killed process group");
            true
        }
        Err(errno) => {
            tracing::debug!(pgid, %errno, "Failed to kill process group");
            false
        }
    }
}

/// Returns true while any process, zombies included, remains in the group.
#[must_use]
pub fn group_exists(pgid: u32) -> bool {
    target(pgid).is_some_and(|target| killpg(target, None).is_ok())
}
