//! Aggregate support (winner-take-all): each region's full weight goes to its
//! leader. Regions without a leader, or missing from the region table,
//! contribute nothing. No probability involved.

use std::collections::BTreeMap;

use pm_core::{CandidateId, RegionOutcome, RegionTable};

pub fn total_weight(outcomes: &[RegionOutcome], regions: &RegionTable) -> BTreeMap<CandidateId, u32> {
    let mut totals: BTreeMap<CandidateId, u32> = BTreeMap::new();
    for o in outcomes {
        let (Some(leader), Some(w)) = (&o.leader, regions.weight(o.region.as_str())) else {
            continue;
        };
        *totals.entry(leader.clone()).or_insert(0) += w;
    }
    totals
}
