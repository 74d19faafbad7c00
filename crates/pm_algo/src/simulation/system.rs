//! System outcome simulator.
//!
//! Each trial assigns every region's weight to one candidate drawn from that
//! region's win probabilities, then records the first candidate (in sorted
//! order) whose total reaches the majority threshold. Trials where nobody
//! reaches it are indecisive and are counted separately.
//!
//! Before sampling, the configured bias target's regional probability is
//! multiplied by `bias_factor` and the region is renormalized to 100.
//!
//! Every region needs win probabilities. If any region lacks them (regional
//! simulation skipped for missing priors) the system simulation does not run.

use std::collections::BTreeMap;

use pm_core::{
    CancelToken, CandidateId, Denominator, RandomSource, RegionId, RegionOutcome, RegionTable,
    SimulationSummary, SystemSimParams, WinProbabilities,
};
use tracing::{info, warn};

use crate::SimError;

/// Output of one system simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemSimulation {
    pub win_probabilities: WinProbabilities,
    pub summary: SimulationSummary,
}

struct Prepared {
    weight: u32,
    /// Candidate index and cumulative mass in `[0, 100]`.
    walk: Vec<(usize, f64)>,
}

/// Regions whose outcome carries no usable win probabilities.
pub fn regions_without_probabilities(outcomes: &[RegionOutcome]) -> Vec<RegionId> {
    outcomes
        .iter()
        .filter(|o| {
            o.win_probabilities
                .as_ref()
                .map_or(true, |p| !p.values().any(|v| *v > 0.0 && v.is_finite()))
        })
        .map(|o| o.region.clone())
        .collect()
}

/// Bias-adjust and renormalize one region's probabilities.
pub fn adjusted_probabilities(
    probs: &WinProbabilities,
    bias_target: Option<&CandidateId>,
    bias_factor: f64,
) -> Option<WinProbabilities> {
    let scaled: Vec<(CandidateId, f64)> = probs
        .iter()
        .map(|(c, p)| {
            let p = if Some(c) == bias_target { p * bias_factor } else { *p };
            (c.clone(), p.max(0.0))
        })
        .collect();
    let total: f64 = scaled.iter().map(|(_, p)| p).sum();
    if !(total > 0.0 && total.is_finite()) {
        return None;
    }
    Some(scaled.into_iter().map(|(c, p)| (c, p / total * 100.0)).collect())
}

/// Walk cumulative mass; the last candidate with nonzero mass absorbs rounding.
fn pick(cumulative: &[(usize, f64)], u: f64) -> Option<usize> {
    cumulative
        .iter()
        .find(|(_, cum)| u < *cum)
        .or_else(|| cumulative.last())
        .map(|(i, _)| *i)
}

/// Run `params.iterations` trials over `outcomes`.
///
/// `cancel` is polled before every trial. Fails with
/// [`SimError::MissingProbabilities`] when any region has no probabilities.
pub fn simulate_system<R: RandomSource>(
    outcomes: &[RegionOutcome],
    regions: &RegionTable,
    params: &SystemSimParams,
    majority_threshold: u32,
    bias_target: Option<&CandidateId>,
    cancel: Option<&CancelToken>,
    rng: &mut R,
) -> Result<SystemSimulation, SimError> {
    if params.iterations == 0 {
        return Err(SimError::NoIterations);
    }
    let missing = regions_without_probabilities(outcomes);
    if !missing.is_empty() {
        warn!(regions = missing.len(), "regions without win probabilities; simulation unavailable");
        return Err(SimError::MissingProbabilities);
    }

    // Candidate universe in sorted order.
    let mut index: BTreeMap<CandidateId, usize> = BTreeMap::new();
    for o in outcomes {
        let named = o.win_probabilities.iter().flat_map(|m| m.keys()).chain(o.leader.iter());
        for c in named {
            index.entry(c.clone()).or_insert(0);
        }
    }
    for (i, v) in index.values_mut().enumerate() {
        *v = i;
    }
    let candidates: Vec<CandidateId> = index.keys().cloned().collect();

    let mut prepared = Vec::with_capacity(outcomes.len());
    for o in outcomes {
        let Some(weight) = regions.weight(o.region.as_str()) else {
            warn!(region = %o.region, "region not in region table; skipped in simulation");
            continue;
        };
        let adjusted = o
            .win_probabilities
            .as_ref()
            .and_then(|p| adjusted_probabilities(p, bias_target, params.bias_factor))
            .ok_or(SimError::MissingProbabilities)?;
        let mut cum = 0.0;
        let mut walk = Vec::new();
        for (c, p) in adjusted.iter().filter(|(_, p)| **p > 0.0) {
            cum += p;
            walk.push((index[c], cum));
        }
        prepared.push(Prepared { weight, walk });
    }

    let mut tallies = vec![0u32; candidates.len()];
    let mut totals = vec![0u32; candidates.len()];
    let mut decisive = 0u32;

    for _ in 0..params.iterations {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(SimError::Cancelled);
        }
        totals.iter_mut().for_each(|t| *t = 0);
        for r in &prepared {
            if let Some(i) = pick(&r.walk, rng.uniform(0.0, 100.0)) {
                totals[i] += r.weight;
            }
        }
        if let Some(w) = totals.iter().position(|t| *t >= majority_threshold) {
            tallies[w] += 1;
            decisive += 1;
        }
    }

    let trials = params.iterations;
    let denom = match params.denominator {
        Denominator::DecisiveTrials => decisive,
        Denominator::AllTrials => trials,
    };
    let win_probabilities = candidates
        .iter()
        .zip(&tallies)
        .map(|(c, t)| {
            let p = if denom == 0 { 0.0 } else { f64::from(*t) / f64::from(denom) * 100.0 };
            (c.clone(), p)
        })
        .collect();

    info!(trials, decisive, indecisive = trials - decisive, "system simulation finished");

    Ok(SystemSimulation {
        win_probabilities,
        summary: SimulationSummary {
            trials,
            decisive_trials: decisive,
            indecisive_trials: trials - decisive,
            majority_threshold,
            denominator: params.denominator,
            tallies: candidates.into_iter().zip(tallies).collect(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::outcome;
    use pm_core::{RegionEntry, ReplaySource, SimRng};

    fn table(entries: &[(&str, u32)]) -> RegionTable {
        RegionTable::from_entries(
            entries
                .iter()
                .map(|(n, w)| RegionEntry { name: n.parse().unwrap(), weight: *w, abbreviation: None })
                .collect(),
        )
        .unwrap()
    }

    fn params(iterations: u32) -> SystemSimParams {
        SystemSimParams { iterations, ..SystemSimParams::default() }
    }

    #[test]
    fn bias_factor_renormalizes() {
        let mut p = WinProbabilities::new();
        p.insert("A".parse().unwrap(), 50.0);
        p.insert("B".parse().unwrap(), 50.0);
        let b: CandidateId = "B".parse().unwrap();
        let adj = adjusted_probabilities(&p, Some(&b), 1.6).unwrap();
        assert!((adj["B"] - 80.0 / 1.3).abs() < 1e-9);
        assert!((adj.values().sum::<f64>() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rounding_falls_back_to_last_nonzero() {
        let walk = vec![(0, 60.0), (1, 99.999_999)];
        assert_eq!(pick(&walk, 99.9999995), Some(1));
        assert_eq!(pick(&walk, 10.0), Some(0));
        assert_eq!(pick(&[], 10.0), None);
    }

    #[test]
    fn indecisive_trials_counted_and_denominator_policy() {
        // 3 + 3 of 6 with threshold 4: a split is indecisive.
        let regions = table(&[("R1", 3), ("R2", 3)]);
        let outs = vec![outcome("R1", &[("A", 50.0), ("B", 50.0)]), outcome("R2", &[("A", 50.0), ("B", 50.0)])];
        // Draws (×100): R1→A, R2→B (split); R1→A, R2→A (A wins).
        let script = vec![0.1, 0.9, 0.1, 0.1];

        let mut rng = ReplaySource::new(script.clone());
        let decisive =
            simulate_system(&outs, &regions, &params(2), 4, None, None, &mut rng).unwrap();
        assert_eq!(decisive.summary.decisive_trials, 1);
        assert_eq!(decisive.summary.indecisive_trials, 1);
        assert_eq!(decisive.win_probabilities["A"], 100.0);

        let mut rng = ReplaySource::new(script);
        let all = SystemSimParams { denominator: Denominator::AllTrials, ..params(2) };
        let diluted = simulate_system(&outs, &regions, &all, 4, None, None, &mut rng).unwrap();
        assert_eq!(diluted.win_probabilities["A"], 50.0);
        assert_eq!(diluted.win_probabilities["B"], 0.0);
    }

    #[test]
    fn missing_probabilities_make_simulation_unavailable() {
        let regions = table(&[("R1", 5), ("R2", 5)]);
        let mut o = outcome("R2", &[("A", 100.0)]);
        o.win_probabilities = None;
        o.leader = Some("B".parse().unwrap());
        let outs = vec![outcome("R1", &[("A", 60.0), ("B", 40.0)]), o];
        assert_eq!(regions_without_probabilities(&outs), vec!["R2".parse::<RegionId>().unwrap()]);
        let mut rng = SimRng::from_seed_u64(3);
        let r = simulate_system(&outs, &regions, &params(100), 6, None, None, &mut rng);
        assert_eq!(r, Err(SimError::MissingProbabilities));
    }

    #[test]
    fn cancelled_token_aborts() {
        let regions = table(&[("R1", 5)]);
        let outs = vec![outcome("R1", &[("A", 100.0)])];
        let token = CancelToken::new();
        token.cancel();
        let mut rng = SimRng::from_seed_u64(3);
        let r = simulate_system(&outs, &regions, &params(10), 3, None, Some(&token), &mut rng);
        assert_eq!(r, Err(SimError::Cancelled));
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut rng = SimRng::from_seed_u64(0);
        let r = simulate_system(&[], &RegionTable::default(), &params(0), 1, None, None, &mut rng);
        assert_eq!(r, Err(SimError::NoIterations));
    }
}
