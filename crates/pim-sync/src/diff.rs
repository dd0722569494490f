use serde_json::Value;

/// Result of comparing a desired representation against the last snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    /// No snapshot exists for the product.
    Absent,
    Unchanged,
    Changed,
}

/// Compares `desired` against the last pushed `snapshot`.
///
/// Equality is structural: object key order is irrelevant, array order is
/// significant, and a key holding `null` is different from a missing key.
#[must_use]
pub fn diff(desired: &Value, snapshot: Option<&Value>) -> DiffOutcome {
    match snapshot {
        None => DiffOutcome::Absent,
        Some(previous) if previous == desired => DiffOutcome::Unchanged,
        Some(_) => DiffOutcome::Changed,
    }
}
