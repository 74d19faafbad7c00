//! Regional aggregator.
//!
//! A region with at least `min_sample_count` qualifying records is aggregated
//! live; otherwise it is handed to the default allocator.
//!
//! Live aggregation:
//! 1. group the region's records by candidate in first-seen order
//! 2. each candidate's support is the mean of its adjusted support
//! 3. drop candidates whose mean is below `min_share`
//! 4. add the swing to the swing target's mean
//! 5. leader and runner-up by a single top-two scan (first seen wins ties)
//! 6. signed margin, tier, and simulation shares (supports normalized to 100)

use std::collections::BTreeMap;

use pm_core::{
    determinism::{group_first_seen, mean, normalize_to_100},
    CandidateId, EngineConfig, OutcomeBasis, Priors, RandomSource, RegionId, RegionOutcome,
    Tier, WeightedRecord,
};
use tracing::debug;

use crate::allocation::default::allocate_default;
use crate::simulation::region::simulate_region;
use crate::tier;

/// Deterministic part of a live aggregation (no simulation).
#[derive(Clone, Debug, PartialEq)]
pub struct LiveSupport {
    /// Post-swing mean support, first-seen order.
    pub support: Vec<(CandidateId, f64)>,
    /// `support` normalized to sum to 100, same order.
    pub shares: Vec<(CandidateId, f64)>,
    pub leader: CandidateId,
    pub runner_up: Option<CandidateId>,
    pub margin: f64,
    pub tier: Tier,
}

/// Leader and runner-up indices in one pass. Strictly-greater comparisons, so
/// the earlier entry keeps its place on equal values.
pub fn top_two(values: &[f64]) -> Option<(usize, Option<usize>)> {
    let mut first: Option<usize> = None;
    let mut second: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        match first {
            None => first = Some(i),
            Some(f) if v > values[f] => {
                second = first;
                first = Some(i);
            }
            Some(_) => {
                if second.map_or(true, |s| v > values[s]) {
                    second = Some(i);
                }
            }
        }
    }
    first.map(|f| (f, second))
}

/// Records of `region`, in input order.
pub fn region_records<'a>(
    records: &'a [WeightedRecord],
    region: &'a RegionId,
) -> impl Iterator<Item = &'a WeightedRecord> + 'a {
    records.iter().filter(move |r| r.region() == region)
}

/// Live support for one region's records. `None` when no candidate survives
/// the minimum-share filter.
pub fn live_support<'a, I>(records: I, swing: f64, cfg: &EngineConfig) -> Option<LiveSupport>
where
    I: IntoIterator<Item = &'a WeightedRecord>,
{
    let grouped = group_first_seen(
        records.into_iter().map(|r| (r.candidate().clone(), r.adjusted_support)),
    );
    let swing_target = cfg.candidates.swing_target();
    let support: Vec<(CandidateId, f64)> = grouped
        .into_iter()
        .filter_map(|(c, vals)| mean(&vals).map(|m| (c, m)))
        .filter(|(_, m)| *m >= cfg.aggregation.min_share)
        .map(|(c, m)| if c == *swing_target { (c, m + swing) } else { (c, m) })
        .collect();

    let values: Vec<f64> = support.iter().map(|(_, v)| *v).collect();
    let (li, ri) = top_two(&values)?;
    let runner_value = ri.map_or(0.0, |i| values[i]);
    let gap = values[li] - runner_value;
    let leader = support[li].0.clone();
    let margin = if leader == cfg.candidates.reference { gap } else { -gap };

    let clamped: Vec<f64> = values.iter().map(|v| v.max(0.0)).collect();
    let normalized = normalize_to_100(&clamped).unwrap_or_else(|| vec![0.0; clamped.len()]);
    let shares = support.iter().map(|(c, _)| c.clone()).zip(normalized).collect();

    Some(LiveSupport {
        runner_up: ri.map(|i| support[i].0.clone()),
        tier: tier::classify(margin, &cfg.tiers),
        leader,
        margin,
        shares,
        support,
    })
}

/// Aggregate one region: live when it has enough records, else the default
/// allocator. `None` means the region has no outcome (unconfigured).
pub fn aggregate_region<R: RandomSource>(
    records: &[WeightedRecord],
    region: &RegionId,
    swing: f64,
    cfg: &EngineConfig,
    priors: Option<&Priors>,
    rng: &mut R,
) -> Option<RegionOutcome> {
    let mine: Vec<&WeightedRecord> = region_records(records, region).collect();
    let sample_count = mine.len();

    let live = if sample_count >= cfg.aggregation.min_sample_count {
        live_support(mine.iter().copied(), swing, cfg)
    } else {
        None
    };

    let Some(live) = live else {
        debug!(%region, sample_count, "insufficient live data; using default allocation");
        return allocate_default(
            region,
            sample_count,
            &cfg.defaults,
            &cfg.candidates,
            &cfg.tiers,
            rng,
        );
    };

    let win_probabilities =
        simulate_region(&live.shares, priors, &cfg.candidates, &cfg.region_sim, rng);

    Some(RegionOutcome {
        region: region.clone(),
        basis: OutcomeBasis::Live,
        sample_count,
        leader: Some(live.leader),
        runner_up: live.runner_up,
        margin: live.margin,
        tier: live.tier,
        support: live.support.into_iter().collect::<BTreeMap<_, _>>(),
        shares: live.shares.into_iter().collect::<BTreeMap<_, _>>(),
        win_probabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{config, date, weighted};
    use pm_core::SimRng;

    #[test]
    fn top_two_first_seen_wins_ties() {
        assert_eq!(top_two(&[3.0, 5.0, 5.0, 4.0]), Some((1, Some(2))));
        assert_eq!(top_two(&[5.0, 1.0]), Some((0, Some(1))));
        assert_eq!(top_two(&[1.0, 5.0]), Some((1, Some(0))));
        assert_eq!(top_two(&[2.0]), Some((0, None)));
        assert_eq!(top_two(&[]), None);
    }

    #[test]
    fn testland_scenario() {
        let cfg = config();
        let d = date(2024, 11, 1);
        let recs = vec![
            weighted(1, "Testland", "A", 60.0, d),
            weighted(2, "Testland", "B", 40.0, d),
            weighted(3, "Testland", "B", 35.0, d),
        ];
        let live = live_support(&recs, 0.0, &cfg).unwrap();
        assert_eq!(live.leader.as_str(), "A");
        assert_eq!(live.runner_up.as_ref().map(|c| c.as_str()), Some("B"));
        assert!((live.margin - 22.5).abs() < 1e-12);
        assert_eq!(live.tier, Tier::SolidFavorable);
    }

    #[test]
    fn swing_shifts_only_target() {
        let cfg = config(); // swing target defaults to the opposed candidate "B"
        let d = date(2024, 11, 1);
        let recs = vec![
            weighted(1, "R", "A", 50.0, d),
            weighted(2, "R", "B", 48.0, d),
            weighted(3, "R", "C", 2.0, d),
        ];
        let base = live_support(&recs, 0.0, &cfg).unwrap();
        let swung = live_support(&recs, 5.0, &cfg).unwrap();
        for ((c0, v0), (c1, v1)) in base.support.iter().zip(&swung.support) {
            assert_eq!(c0, c1);
            let expected = if c0.as_str() == "B" { v0 + 5.0 } else { *v0 };
            assert_eq!(*v1, expected);
        }
        assert_eq!(swung.leader.as_str(), "B");
        assert!((swung.margin - -3.0).abs() < 1e-12);
        assert_eq!(swung.tier, Tier::LeanOpposed);
    }

    #[test]
    fn tiny_candidates_dropped_before_shares() {
        let cfg = config();
        let d = date(2024, 11, 1);
        let recs = vec![
            weighted(1, "R", "A", 60.0, d),
            weighted(2, "R", "B", 40.0, d),
            weighted(3, "R", "Fringe", 0.1, d),
        ];
        let live = live_support(&recs, 0.0, &cfg).unwrap();
        assert_eq!(live.shares.len(), 2);
        let sum: f64 = live.shares.iter().map(|(_, s)| s).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn single_candidate_margin_against_zero() {
        let cfg = config();
        let recs = vec![weighted(1, "R", "B", 30.0, date(2024, 11, 1))];
        let live = live_support(&recs, 0.0, &cfg).unwrap();
        assert_eq!(live.runner_up, None);
        assert_eq!(live.margin, -30.0);
        assert_eq!(live.tier, Tier::SolidOpposed);
    }

    #[test]
    fn sample_count_boundary_routes_to_default() {
        let mut cfg = config();
        cfg.aggregation.min_sample_count = 3;
        cfg.defaults.favorable.push("R".parse().unwrap());
        let d = date(2024, 11, 1);
        let region: RegionId = "R".parse().unwrap();

        let two = vec![weighted(1, "R", "B", 60.0, d), weighted(2, "R", "A", 40.0, d)];
        let mut rng = SimRng::from_seed_u64(5);
        let o = aggregate_region(&two, &region, 0.0, &cfg, None, &mut rng).unwrap();
        assert_eq!(o.basis, OutcomeBasis::Default);
        assert_eq!(o.sample_count, 2);

        let mut three = two.clone();
        three.push(weighted(3, "R", "B", 58.0, d));
        let o = aggregate_region(&three, &region, 0.0, &cfg, None, &mut rng).unwrap();
        assert_eq!(o.basis, OutcomeBasis::Live);
        assert_eq!(o.leader.as_ref().map(|c| c.as_str()), Some("B"));
        // Prior-scaled spread without priors: probabilities unavailable.
        assert!(o.win_probabilities.is_none());
    }

    #[test]
    fn unconfigured_sparse_region_has_no_outcome() {
        let cfg = config();
        let region: RegionId = "Nowhere".parse().unwrap();
        let mut rng = SimRng::from_seed_u64(5);
        assert!(aggregate_region(&[], &region, 0.0, &cfg, None, &mut rng).is_none());
    }
}
