//! Domain logic for the HVAC plan-conversion pipeline.
//!
//! Everything here is free of HTTP and shared state: error taxonomy, job
//! states, the stdout milestone table, stderr classification, completion
//! ledger keys, and the streaming subprocess primitive the launcher drives.

pub mod error;
pub mod pipeline;
pub mod scripting;
pub mod types;
