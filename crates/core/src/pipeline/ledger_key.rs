//! Completion ledger key construction.
//!
//! Browser clients URL-encode the plan identifier in query strings but send
//! it raw in JSON bodies, so both forms must land on the same key.

use std::borrow::Cow;

/// Normalise a plan identifier: percent-decode once, then trim whitespace.
///
/// Malformed percent sequences are left as-is rather than rejected.
pub fn normalize_plan_id(raw: &str) -> String {
    let decoded = urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw));
    decoded.trim().to_string()
}

/// Build the composite `uuid_planId` key.
pub fn completion_key(uuid: &str, plan_id: &str) -> String {
    format!("{uuid}_{}", normalize_plan_id(plan_id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
