//! childsieve - supervise child processes that speak line-delimited JSON.
//!
//! A [`sieve::StreamSieve`] splits arbitrary text chunks into lines and
//! classifies each one as a JSON object, a JSON array, or a raw line.
//! On Unix, [`child::SupervisedChild`] runs a command in its own process
//! group, feeds its stdout through a sieve, and tears the whole group down
//! on close. [`adapter`] is the other end of the pipe for programs being
//! supervised.

pub mod adapter;
#[cfg(unix)]
pub mod child;
pub mod config;
#[cfg(unix)]
pub mod display;
pub mod sieve;
