//! Blended adjustment: mix prior probabilities into the two major candidates'
//! records, then apply the named manual override table.

use pm_core::{BlendWeights, CandidateRoles, ManualOverride, Priors, WeightedRecord};
use tracing::debug;

/// `adjusted' = odds * prior + polls * adjusted` for the two major candidates.
///
/// Other candidates pass through unchanged. Without priors nothing changes.
pub fn blend(
    mut records: Vec<WeightedRecord>,
    priors: Option<&Priors>,
    roles: &CandidateRoles,
    w: &BlendWeights,
) -> Vec<WeightedRecord> {
    let Some(priors) = priors else { return records };
    for r in records.iter_mut().filter(|r| roles.is_major(r.candidate())) {
        if let Some(prior) = priors.get(r.candidate().as_str()) {
            r.adjusted_support = w.odds * prior + w.polls * r.adjusted_support;
        }
    }
    records
}

/// Add each override's shift to every record of its (region, candidate).
///
/// A region's mean support for that candidate therefore moves by exactly
/// `shift`.
pub fn apply_overrides(
    mut records: Vec<WeightedRecord>,
    overrides: &[ManualOverride],
) -> Vec<WeightedRecord> {
    for o in overrides {
        let mut hit = 0usize;
        for r in records
            .iter_mut()
            .filter(|r| *r.region() == o.region && *r.candidate() == o.candidate)
        {
            r.adjusted_support += o.shift;
            hit += 1;
        }
        debug!(region = %o.region, candidate = %o.candidate, shift = o.shift, records = hit,
            note = o.note.as_deref().unwrap_or(""), "manual override applied");
    }
    records
}
