//! Default allocator: historical-lean fallback for regions with too little data.
//!
//! The lean table is explicit configuration, never inferred from polls:
//! - region on the favorable list → reference candidate favored
//! - region on the opposed list → opposed candidate favored
//! - neither → no outcome (the region is simply skipped)
//!
//! The favored candidate's probability is the region's fixed competitive
//! probability if one is configured, else a uniform draw from the base range.

use std::collections::BTreeMap;

use pm_core::{
    CandidateRoles, LeanTable, OutcomeBasis, RandomSource, RegionId, RegionOutcome, Tier,
    TierCutpoints,
};

use crate::tier::representative_margin;

/// Synthesize an outcome for `region`, or `None` when it is on neither list.
pub fn allocate_default<R: RandomSource>(
    region: &RegionId,
    sample_count: usize,
    table: &LeanTable,
    roles: &CandidateRoles,
    cutpoints: &TierCutpoints,
    rng: &mut R,
) -> Option<RegionOutcome> {
    let (favored, other, solid) = if table.favorable.contains(region) {
        (&roles.reference, &roles.opposed, Tier::SolidFavorable)
    } else if table.opposed.contains(region) {
        (&roles.opposed, &roles.reference, Tier::SolidOpposed)
    } else {
        return None;
    };

    let tier = table.tier_overrides.get(region).copied().unwrap_or(solid);
    let p = match table.fixed_probability.get(region) {
        Some(p) => *p,
        None => rng.uniform(table.base_probability_min, table.base_probability_max),
    };

    let mut win = BTreeMap::new();
    win.insert(favored.clone(), p);
    win.insert(other.clone(), 100.0 - p);

    Some(RegionOutcome {
        region: region.clone(),
        basis: OutcomeBasis::Default,
        sample_count,
        leader: Some(favored.clone()),
        runner_up: Some(other.clone()),
        margin: representative_margin(tier, cutpoints),
        tier,
        support: BTreeMap::new(),
        shares: BTreeMap::new(),
        win_probabilities: Some(win),
    })
}
