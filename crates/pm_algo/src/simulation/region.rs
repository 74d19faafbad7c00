//! Regional win-probability simulator.
//!
//! Each trial perturbs every candidate's share by
//! `(u - bias_constant) * spread` with `u` uniform in `[0, 1)`, clamps to
//! `[0, 100]`, and awards the trial to the maximum sample. Ties go to the
//! candidate listed first.
//!
//! With the reference bias constant of 0.45 variation skews upward.

use pm_core::{
    determinism::argmax_first, CandidateId, CandidateRoles, Priors, RandomSource,
    RegionSimParams, Spread, WinProbabilities,
};

/// Per-candidate spread, or `None` when prior-scaled spread lacks priors.
pub fn spreads(
    shares: &[(CandidateId, f64)],
    priors: Option<&Priors>,
    roles: &CandidateRoles,
    spread: &Spread,
) -> Option<Vec<f64>> {
    match *spread {
        Spread::Fixed { points } => Some(vec![points; shares.len()]),
        Spread::PriorScaled { max_points } => {
            let priors = priors?;
            shares
                .iter()
                .map(|(c, share)| {
                    let raw = if roles.is_major(c) { priors.get(c.as_str())? } else { *share };
                    Some(raw.clamp(0.0, max_points))
                })
                .collect()
        }
    }
}

/// Win probability (percent) per candidate in `shares` order.
///
/// Returns `None` when the simulation cannot run: no candidates, zero
/// iterations, or prior-scaled spread without priors.
pub fn simulate_region<R: RandomSource>(
    shares: &[(CandidateId, f64)],
    priors: Option<&Priors>,
    roles: &CandidateRoles,
    params: &RegionSimParams,
    rng: &mut R,
) -> Option<WinProbabilities> {
    if shares.is_empty() || params.iterations == 0 {
        return None;
    }
    let spread = spreads(shares, priors, roles, &params.spread)?;
    let mut wins = vec![0u32; shares.len()];
    let mut samples = vec![0.0f64; shares.len()];

    for _ in 0..params.iterations {
        for (i, (_, share)) in shares.iter().enumerate() {
            let variation = (rng.next_unit() - params.bias_constant) * spread[i];
            samples[i] = (share + variation).clamp(0.0, 100.0);
        }
        if let Some(w) = argmax_first(&samples) {
            wins[w] += 1;
        }
    }

    let n = f64::from(params.iterations);
    Some(
        shares
            .iter()
            .zip(wins)
            .map(|((c, _), w)| (c.clone(), f64::from(w) / n * 100.0))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_core::{ReplaySource, SimRng};
    use std::collections::BTreeMap;

    fn roles() -> CandidateRoles {
        CandidateRoles {
            reference: "A".parse().unwrap(),
            opposed: "B".parse().unwrap(),
            swing_target: None,
            system_bias_target: None,
        }
    }

    fn shares(a: f64, b: f64) -> Vec<(CandidateId, f64)> {
        vec![("A".parse().unwrap(), a), ("B".parse().unwrap(), b)]
    }

    fn priors() -> Priors {
        let mut m = BTreeMap::new();
        m.insert("A".parse().unwrap(), 50.0);
        m.insert("B".parse().unwrap(), 50.0);
        Priors::new(m).unwrap()
    }

    fn fixed(iterations: u32, points: f64) -> RegionSimParams {
        RegionSimParams { iterations, spread: Spread::Fixed { points }, ..RegionSimParams::default() }
    }

    #[test]
    fn scripted_draws_decide_trials() {
        // Trial 1: A=50+(0.9-0.45)*10, B=50+(0.1-0.45)*10 → A.
        // Trial 2: A low, B high → B.
        let mut r = ReplaySource::new(vec![0.9, 0.1, 0.1, 0.9]);
        let p = simulate_region(&shares(50.0, 50.0), None, &roles(), &fixed(2, 10.0), &mut r).unwrap();
        assert_eq!(p["A"], 50.0);
        assert_eq!(p["B"], 50.0);
    }

    #[test]
    fn exact_tie_goes_to_first_listed() {
        let mut r = ReplaySource::new(vec![0.5]);
        let p = simulate_region(&shares(50.0, 50.0), None, &roles(), &fixed(10, 10.0), &mut r).unwrap();
        assert_eq!(p["A"], 100.0);
        assert_eq!(p["B"], 0.0);
    }

    #[test]
    fn prior_scaled_without_priors_is_unavailable() {
        let params = RegionSimParams::default();
        let mut rng = SimRng::from_seed_u64(1);
        assert!(simulate_region(&shares(60.0, 40.0), None, &roles(), &params, &mut rng).is_none());
        assert_eq!(rng.words_consumed(), 0);
    }

    #[test]
    fn prior_scaled_uses_prior_for_majors_share_for_others() {
        let mut s = shares(45.0, 45.0);
        s.push(("C".parse().unwrap(), 10.0));
        let sp = spreads(&s, Some(&priors()), &roles(), &Spread::PriorScaled { max_points: 20.0 })
            .unwrap();
        assert_eq!(sp, vec![20.0, 20.0, 10.0]);
    }

    #[test]
    fn probabilities_sum_to_100_and_favor_leader() {
        let mut rng = SimRng::from_seed_u64(42);
        let params = RegionSimParams::default();
        let p = simulate_region(&shares(60.0, 40.0), Some(&priors()), &roles(), &params, &mut rng)
            .unwrap();
        let sum: f64 = p.values().sum();
        assert!((sum - 100.0).abs() < 0.01);
        assert!(p["A"] > p["B"]);
    }

    #[test]
    fn same_seed_same_result() {
        let params = RegionSimParams::default();
        let run = |seed| {
            let mut rng = SimRng::from_seed_u64(seed);
            simulate_region(&shares(52.0, 48.0), Some(&priors()), &roles(), &params, &mut rng)
        };
        assert_eq!(run(7), run(7));
    }
}
