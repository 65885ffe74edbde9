//! Stream sieve: reassembles lines from chunked input and picks out
//! line-delimited JSON objects and arrays.
//!
//! Pretty-printed JSON spanning several lines is not recognized.

mod classify;
mod decode;
mod frame;
mod line;

pub use classify::*;
pub use decode::*;
pub use frame::*;
pub use line::*;
