//! External executable supervision primitives.
//!
//! [`executor`] defines the command description and error types;
//! [`subprocess`] spawns the child and streams its output line by line.
//! Neither touches shared state, so the launcher in the API crate owns all
//! registry bookkeeping.

pub mod executor;
pub mod subprocess;
