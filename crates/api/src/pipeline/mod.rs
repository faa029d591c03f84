//! Pipeline job orchestration services.
//!
//! - [`JobRegistry`] -- live jobs keyed by project id; rejects duplicates.
//! - [`ProcessLauncher`] -- runs and supervises the conversion executable.
//! - [`CompletionLedger`] -- completion flags keyed by `uuid_planId`.
//! - [`LedgerSync`] -- optional bridge marking the ledger on success.
//!
//! All of these are held in [`AppState`](crate::state::AppState) behind
//! `Arc`, so tests can build isolated instances.

pub mod launcher;
pub mod ledger;
pub mod registry;
pub mod sync;

pub use launcher::ProcessLauncher;
pub use ledger::CompletionLedger;
pub use registry::{Accepted, JobRegistry, LaunchRequest, ProgressSnapshot};
pub use sync::LedgerSync;
