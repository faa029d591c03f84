//! HVAC plan pipeline API server library.
//!
//! Exposes configuration, state, error handling, the pipeline services and
//! the router so integration tests and the binary share one code path.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod router;
pub mod routes;
pub mod state;
