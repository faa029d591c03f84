//! Stdout milestone markers emitted by the conversion executable.
//!
//! The executable prints a fixed line when each stage finishes. Each marker
//! maps to a fixed progress percentage. Matching is case-insensitive
//! substring containment, and the last marker observed wins: a late "OCR
//! Complete" after "Scale Extraction Complete" moves progress back to 25.

/// A stdout marker and the progress percentage it represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub marker: &'static str,
    pub percent: u8,
}

/// Milestone table, checked in order. The first matching entry wins when a
/// single line contains more than one marker.
pub const MILESTONES: [Milestone; 4] = [
    Milestone {
        marker: "OCR Complete",
        percent: 25,
    },
    Milestone {
        marker: "Line Detection Complete",
        percent: 50,
    },
    Milestone {
        marker: "Scale Extraction Complete",
        percent: 75,
    },
    Milestone {
        marker: "Pipeline Complete",
        percent: 100,
    },
];

/// Progress reported before any marker has been seen.
pub const INITIAL_PROGRESS: u8 = 0;

/// Return the milestone matched by a single stdout line, if any.
pub fn match_milestone(line: &str) -> Option<Milestone> {
    let haystack = line.to_ascii_lowercase();
    MILESTONES
        .iter()
        .find(|m| haystack.contains(&m.marker.to_ascii_lowercase()))
        .copied()
}

/// Convenience wrapper returning only the percentage.
pub fn progress_for_line(line: &str) -> Option<u8> {
    match_milestone(line).map(|m| m.percent)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
