//! Recency selection over a listing's candidates.

use crate::error::HarvestError;
use crate::models::ExtractCandidate;

/// Pick the candidate with the latest `posted_at`.
///
/// Ties go to the earliest candidate in document order: the running maximum
/// is only replaced on a strictly later timestamp.
///
/// # Errors
///
/// [`HarvestError::Selection`] when `candidates` is empty.
pub fn select_most_recent(candidates: &[ExtractCandidate]) -> Result<&ExtractCandidate, HarvestError> {
    let mut iter = candidates.iter();
    let mut best = iter.next().ok_or(HarvestError::Selection)?;
    for candidate in iter {
        if candidate.posted_at > best.posted_at {
            best = candidate;
        }
    }
    Ok(best)
}
