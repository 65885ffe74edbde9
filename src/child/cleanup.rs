//! Process-wide cleanup of supervised process groups.
//!
//! Children spawned with `kill_on_exit` register their process group here
//! until their exit is synchronized. If this process is asked to terminate
//! by SIGTERM, SIGINT, SIGHUP or SIGQUIT, every registered group is killed
//! before the signal's default action runs. [`ExitGuard`] covers normal
//! returns from `main` and panics that unwind through it.

use std::collections::BTreeSet;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::thread;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;

use super::signal::kill_group;

fn live_groups() -> &'static Mutex<BTreeSet<u32>> {
    static GROUPS: OnceLock<Mutex<BTreeSet<u32>>> = OnceLock::new();
    GROUPS.get_or_init(|| Mutex::new(BTreeSet::new()))
}

pub(crate) fn register(pgid: u32) {
    live_groups()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(pgid);
    install_signal_hook();
}

pub(crate) fn unregister(pgid: u32) {
    live_groups()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&pgid);
}

/// Process groups currently registered for cleanup.
#[must_use]
pub fn registered_groups() -> Vec<u32> {
    live_groups()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .copied()
        .collect()
}

/// SIGKILL every registered process group, returning how many were signalled.
pub fn kill_registered_groups() -> usize {
    let groups = std::mem::take(
        &mut *live_groups()
            .lock()
            .unwrap_or_else(PoisonError::into_inner),
    );
    groups.into_iter().filter(|pgid| kill_group(*pgid)).count()
}

/// Install the termination signal listener once per process.
fn install_signal_hook() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        if let Err(e) = spawn_signal_listener() {
            tracing::warn!(error = %e, "Failed to install exit cleanup hook");
        }
    });
}

fn spawn_signal_listener() -> std::io::Result<()> {
    let mut signals = Signals::new([SIGTERM, SIGINT, SIGHUP, SIGQUIT])?;
    thread::Builder::new()
        .name("childsieve-exit-hook".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                let killed = kill_registered_groups();
                tracing::debug!(signal, killed, "Termination signal received, killed child groups");
                if let Err(e) = signal_hook::low_level::emulate_default_handler(signal) {
                    tracing::warn!(signal, error = %e, "Failed to run default signal action");
                    std::process::exit(128 + signal);
                }
            }
        })?;
    Ok(())
}

/// Kills every registered process group when dropped.
///
/// Hold one in `main` so groups die on normal return and on panic unwind.
#[derive(Debug, Default)]
#[must_use = "dropping the guard immediately kills registered groups"]
pub struct ExitGuard {
    _private: (),
}

impl ExitGuard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let killed = kill_registered_groups();
        if killed > 0 {
            tracing::debug!(killed, "Killed child process groups on exit");
        }
    }
}
