//! Session history: an append-only, typed event log.
//!
//! Statistics are never stored alongside the entries; `stats` recomputes
//! them from the log on every read.

pub mod entry;
pub mod log;
pub mod stats;

pub use entry::*;
pub use log::*;
pub use stats::*;
