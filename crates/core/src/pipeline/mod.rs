//! Pipeline job domain logic.
//!
//! Pure functions and types shared by the job registry, the process
//! launcher and the progress endpoints. No I/O lives here.

pub mod ledger_key;
pub mod markers;
pub mod state;
pub mod stderr;
