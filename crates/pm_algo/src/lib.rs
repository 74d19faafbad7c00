// crates/pm_algo/src/lib.rs
#![forbid(unsafe_code)]

//! Algorithm layer of the projection engine. Pure functions over `pm_core`
//! types; every random draw comes from an injected `RandomSource`.

use thiserror::Error;

/// Errors from the simulation stages. Record-level problems never surface here.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    #[error("simulation cancelled")]
    Cancelled,
    #[error("simulation needs at least one iteration")]
    NoIterations,
    #[error("some regions have no win probabilities")]
    MissingProbabilities,
}

pub mod weighting;
pub mod normalize;
pub mod blend;
pub mod tier;
pub mod aggregate;

// ----------------------------- Allocation (public surface) ---------------------------

pub mod allocation {
    pub mod default;
    pub mod wta;

    pub use default::allocate_default;
    pub use wta::total_weight;
}

// ----------------------------- Simulation (public surface) ---------------------------

pub mod simulation {
    pub mod region;
    pub mod system;

    pub use region::simulate_region;
    pub use system::{regions_without_probabilities, simulate_system, SystemSimulation};
}

// Convenience re-exports (pipeline imports these from crate root)
pub use aggregate::{aggregate_region, live_support, LiveSupport};
pub use allocation::{allocate_default, total_weight};
pub use blend::{apply_overrides, blend};
pub use normalize::{normalize, NormalizeReport};
pub use simulation::{regions_without_probabilities, simulate_region, simulate_system, SystemSimulation};
pub use weighting::{classify as classify_source, weight, SourceCategory};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use pm_core::{
        CandidateId, CandidateRoles, EngineConfig, OutcomeBasis, PollRecord, PopulationType, RegionEntry,
        RegionOutcome, RegionTable, Tier, WeightedRecord,
    };

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Reference candidate "A", opposed "B", one region "R" of weight 10.
    pub fn config() -> EngineConfig {
        let roles = CandidateRoles {
            reference: "A".parse().unwrap(),
            opposed: "B".parse().unwrap(),
            swing_target: None,
            system_bias_target: None,
        };
        let regions = RegionTable::from_entries(vec![RegionEntry {
            name: "R".parse().unwrap(),
            weight: 10,
            abbreviation: None,
        }])
        .unwrap();
        EngineConfig::new(roles, regions)
    }

    pub fn poll(id: u64, region: &str, candidate: &str, pct: f64, end: NaiveDate) -> PollRecord {
        PollRecord {
            region: region.parse().unwrap(),
            source_name: None,
            sponsor_name: None,
            sponsor_candidate: None,
            candidate: candidate.parse().unwrap(),
            support_pct: pct,
            sample_size: None,
            population: PopulationType::Other,
            end_date: end,
            record_id: id,
        }
    }

    /// Weighted record whose adjusted support equals `pct`.
    pub fn weighted(id: u64, region: &str, candidate: &str, pct: f64, end: NaiveDate) -> WeightedRecord {
        WeightedRecord {
            record: poll(id, region, candidate, pct, end),
            credibility_weight: 1.0,
            population_weight: 1.0,
            adjusted_support: pct,
        }
    }

    /// Live outcome with the given win probabilities; the first entry leads.
    pub fn outcome(region: &str, probs: &[(&str, f64)]) -> RegionOutcome {
        let win: BTreeMap<CandidateId, f64> = probs.iter().map(|(c, p)| (c.parse().unwrap(), *p)).collect();
        RegionOutcome {
            region: region.parse().unwrap(),
            basis: OutcomeBasis::Live,
            sample_count: 5,
            leader: probs.first().map(|(c, _)| c.parse().unwrap()),
            runner_up: probs.get(1).map(|(c, _)| c.parse().unwrap()),
            margin: 0.0,
            tier: Tier::TiltFavorable,
            support: BTreeMap::new(),
            shares: BTreeMap::new(),
            win_probabilities: Some(win),
        }
    }
}
