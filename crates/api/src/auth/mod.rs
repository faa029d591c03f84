//! Bearer-token primitives.
//!
//! - [`jwt`] -- JWT access-token validation.

pub mod jwt;
