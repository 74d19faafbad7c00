//! One full projection: normalize → blend → overrides → per-region
//! aggregation → aggregate support → system simulation.
//!
//! The system win probability is `None` when any region lacks win
//! probabilities; those regions are listed in `degraded_regions`.
//!
//! Pure with respect to its inputs: the only randomness is a `SimRng` built
//! from `params.seed`, consumed in region order and then by the system
//! simulation, so the same inputs and parameters reproduce the same result.

use std::collections::BTreeSet;

use pm_algo::{
    aggregate_region, apply_overrides, blend, normalize, regions_without_probabilities,
    simulate_system, total_weight, NormalizeReport, SimError,
};
use pm_core::{
    CancelToken, OutcomeBasis, RegionId, RegionOutcome, RunParams, SimRng, SystemOutcome,
};
use pm_io::hasher::InputDigests;
use pm_io::records::IngestReport;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{Inputs, PipelineError};

/// What degraded or was skipped during a projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub normalize: NormalizeReport,
    pub regions_live: usize,
    pub regions_default: usize,
    /// Too little live data and on no default-allocation list.
    pub regions_skipped: Vec<RegionId>,
    /// Regions named in polls but absent from the region table.
    pub unknown_regions: Vec<RegionId>,
    /// Live regions whose simulation could not run (e.g. missing priors).
    pub regions_without_probabilities: Vec<RegionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights_unavailable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priors_unavailable: Option<String>,
    /// Row counts from ingestion, when the records were read from a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestReport>,
}

impl Diagnostics {
    /// True when any input was missing or any region ran on fallbacks.
    pub fn is_degraded(&self) -> bool {
        self.weights_unavailable.is_some()
            || self.priors_unavailable.is_some()
            || !self.regions_without_probabilities.is_empty()
    }
}

/// A complete, immutable projection snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub params: RunParams,
    pub regions: Vec<RegionOutcome>,
    pub system: SystemOutcome,
    pub diagnostics: Diagnostics,
    /// Digests of the input files, when the inputs were loaded from disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<InputDigests>,
}

impl Projection {
    pub fn region(&self, name: &str) -> Option<&RegionOutcome> {
        self.regions.iter().find(|o| o.region.as_str() == name)
    }
}

fn check(cancel: Option<&CancelToken>) -> Result<(), PipelineError> {
    match cancel {
        Some(t) if t.is_cancelled() => Err(PipelineError::Cancelled),
        _ => Ok(()),
    }
}

/// Run every stage for `params`.
pub fn project(
    inputs: &Inputs,
    params: &RunParams,
    cancel: Option<&CancelToken>,
) -> Result<Projection, PipelineError> {
    params.validate().map_err(|e| PipelineError::Config(e.to_string()))?;
    let cfg = &inputs.config;
    let mut diag = Diagnostics {
        weights_unavailable: inputs.weights.reason().map(str::to_string),
        priors_unavailable: inputs.priors.reason().map(str::to_string),
        ingest: inputs.ingest.clone(),
        ..Diagnostics::default()
    };

    let (weighted, report) =
        normalize(&inputs.records, params.as_of, params.window_days, cfg, inputs.weights.get());
    diag.normalize = report;
    let weighted = blend(weighted, inputs.priors.get(), &cfg.candidates, &cfg.blend);
    let weighted = apply_overrides(weighted, &cfg.overrides);

    let unknown: BTreeSet<&RegionId> = weighted
        .iter()
        .map(|r| r.region())
        .filter(|r| !cfg.regions.contains(r.as_str()))
        .collect();
    if !unknown.is_empty() {
        warn!(count = unknown.len(), "poll regions missing from the region table are ignored");
    }
    diag.unknown_regions = unknown.into_iter().cloned().collect();

    let mut rng = SimRng::from_seed_u64(params.seed);
    let mut outcomes = Vec::with_capacity(cfg.regions.len());
    for region in cfg.regions.regions() {
        check(cancel)?;
        match aggregate_region(&weighted, region, params.swing, cfg, inputs.priors.get(), &mut rng) {
            Some(o) => {
                match o.basis {
                    OutcomeBasis::Live => diag.regions_live += 1,
                    OutcomeBasis::Default => diag.regions_default += 1,
                }
                outcomes.push(o);
            }
            None => diag.regions_skipped.push(region.clone()),
        }
    }
    diag.regions_without_probabilities = regions_without_probabilities(&outcomes);
    info!(
        live = diag.regions_live,
        default = diag.regions_default,
        skipped = diag.regions_skipped.len(),
        "regions aggregated"
    );

    let total_weight_by_candidate = total_weight(&outcomes, &cfg.regions);
    let unavailable = SystemOutcome {
        total_weight_by_candidate: total_weight_by_candidate.clone(),
        degraded_regions: diag.regions_without_probabilities.clone(),
        ..SystemOutcome::default()
    };
    let system = if outcomes.is_empty() {
        unavailable
    } else {
        match simulate_system(
            &outcomes,
            &cfg.regions,
            &cfg.system_sim,
            cfg.majority_threshold(),
            cfg.candidates.system_bias_target.as_ref(),
            cancel,
            &mut rng,
        ) {
            Ok(sim) => SystemOutcome {
                total_weight_by_candidate,
                win_probability_by_candidate: Some(sim.win_probabilities),
                simulation: Some(sim.summary),
                degraded_regions: Vec::new(),
            },
            Err(SimError::MissingProbabilities) => {
                warn!(
                    regions = unavailable.degraded_regions.len(),
                    "system win probability unavailable"
                );
                unavailable
            }
            Err(e) => return Err(e.into()),
        }
    };

    debug!(seed = params.seed, draws = %rng.words_consumed(), "projection finished");
    Ok(Projection {
        params: *params,
        regions: outcomes,
        system,
        diagnostics: diag,
        inputs: inputs.digests.clone(),
    })
}
