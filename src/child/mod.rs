//! Process supervisor: spawns a child into its own process group, sieves
//! its stdout, and terminates the whole group on close.

pub mod cleanup;
mod driver;
mod error;
mod events;
mod process;
mod signal;
mod tracker;

pub use cleanup::{kill_registered_groups, registered_groups, ExitGuard};
pub use error::*;
pub use events::*;
pub use process::*;
pub use signal::group_exists;
