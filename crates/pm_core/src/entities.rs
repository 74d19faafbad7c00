//! Domain records: ingested polls, weighted records, and derived outcomes.
//!
//! `PollRecord` is immutable once ingested. Everything else here is a pure
//! derivation that the pipeline rebuilds whenever a run parameter changes.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::ids::{CandidateId, RegionId};
use crate::variables::Denominator;

/// Candidate → percentage in `[0, 100]`.
pub type WinProbabilities = BTreeMap<CandidateId, f64>;

/// External prior win probabilities (percent) for the major candidates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<CandidateId, f64>", into = "BTreeMap<CandidateId, f64>")]
pub struct Priors(BTreeMap<CandidateId, f64>);

impl Priors {
    pub fn new(map: BTreeMap<CandidateId, f64>) -> Result<Self, CoreError> {
        if map.values().all(|v| v.is_finite() && (0.0..=100.0).contains(v)) {
            Ok(Self(map))
        } else {
            Err(CoreError::InvalidPercentage)
        }
    }

    pub fn get(&self, candidate: &str) -> Option<f64> {
        self.0.get(candidate).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CandidateId, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<BTreeMap<CandidateId, f64>> for Priors {
    type Error = CoreError;
    fn try_from(m: BTreeMap<CandidateId, f64>) -> Result<Self, Self::Error> {
        Self::new(m)
    }
}

impl From<Priors> for BTreeMap<CandidateId, f64> {
    fn from(p: Priors) -> Self {
        p.0
    }
}

/// Surveyed population. Only likely-voter samples get the higher weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationType {
    LikelyVoter,
    #[default]
    Other,
}

impl PopulationType {
    /// Parse the raw population code used by poll exports (`lv`, `rv`, `a`, `v`).
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some(c) if c.eq_ignore_ascii_case("lv") => PopulationType::LikelyVoter,
            _ => PopulationType::Other,
        }
    }
}

/// One (poll, candidate) line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PollRecord {
    pub region: RegionId,
    pub source_name: Option<String>,
    pub sponsor_name: Option<String>,
    pub sponsor_candidate: Option<String>,
    pub candidate: CandidateId,
    pub support_pct: f64,
    pub sample_size: Option<u32>,
    pub population: PopulationType,
    pub end_date: NaiveDate,
    pub record_id: u64,
}

/// A surviving record with its credibility and population weights applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedRecord {
    pub record: PollRecord,
    pub credibility_weight: f64,
    pub population_weight: f64,
    pub adjusted_support: f64,
}

impl WeightedRecord {
    pub fn region(&self) -> &RegionId { &self.record.region }
    pub fn candidate(&self) -> &CandidateId { &self.record.candidate }
}

/// Eight confidence bands, strongest-favorable first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    SolidFavorable,
    LikelyFavorable,
    LeanFavorable,
    TiltFavorable,
    TiltOpposed,
    LeanOpposed,
    LikelyOpposed,
    SolidOpposed,
}

impl Tier {
    pub const ALL: [Tier; 8] = [
        Tier::SolidFavorable,
        Tier::LikelyFavorable,
        Tier::LeanFavorable,
        Tier::TiltFavorable,
        Tier::TiltOpposed,
        Tier::LeanOpposed,
        Tier::LikelyOpposed,
        Tier::SolidOpposed,
    ];

    /// Stable wire token (same as the serde name).
    pub fn token(self) -> &'static str {
        match self {
            Tier::SolidFavorable => "solid_favorable",
            Tier::LikelyFavorable => "likely_favorable",
            Tier::LeanFavorable => "lean_favorable",
            Tier::TiltFavorable => "tilt_favorable",
            Tier::TiltOpposed => "tilt_opposed",
            Tier::LeanOpposed => "lean_opposed",
            Tier::LikelyOpposed => "likely_opposed",
            Tier::SolidOpposed => "solid_opposed",
        }
    }

    pub fn is_favorable(self) -> bool {
        matches!(
            self,
            Tier::SolidFavorable | Tier::LikelyFavorable | Tier::LeanFavorable | Tier::TiltFavorable
        )
    }

    /// Position in [`Tier::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Where a region's outcome came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeBasis {
    /// Aggregated from live poll records.
    Live,
    /// Synthesized by the historical-lean fallback table.
    Default,
}

/// Per-region result of one aggregation pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionOutcome {
    pub region: RegionId,
    pub basis: OutcomeBasis,
    /// Qualifying records seen for the region (0 for synthesized outcomes).
    pub sample_count: usize,
    pub leader: Option<CandidateId>,
    pub runner_up: Option<CandidateId>,
    /// Signed: positive when the leader is the reference candidate.
    pub margin: f64,
    pub tier: Tier,
    /// Mean adjusted support per surviving candidate, after the swing.
    pub support: BTreeMap<CandidateId, f64>,
    /// `support` normalized to sum to 100.
    pub shares: BTreeMap<CandidateId, f64>,
    /// `None` when the simulation could not run (missing priors).
    pub win_probabilities: Option<WinProbabilities>,
}

impl RegionOutcome {
    /// Sum of the win probabilities, if any were computed.
    pub fn probability_sum(&self) -> Option<f64> {
        self.win_probabilities.as_ref().map(|m| m.values().sum())
    }
}

/// Bookkeeping of a system-level simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub trials: u32,
    pub decisive_trials: u32,
    pub indecisive_trials: u32,
    pub majority_threshold: u32,
    pub denominator: Denominator,
    /// Raw winner counts per candidate (decisive trials only).
    pub tallies: BTreeMap<CandidateId, u32>,
}

/// Whole-system result derived from every `RegionOutcome`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemOutcome {
    pub total_weight_by_candidate: BTreeMap<CandidateId, u32>,
    /// `None` when no simulation ran: no region outcomes, or some region
    /// without win probabilities.
    pub win_probability_by_candidate: Option<WinProbabilities>,
    pub simulation: Option<SimulationSummary>,
    /// Regions without win probabilities that kept the simulation from running.
    pub degraded_regions: Vec<RegionId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_codes() {
        assert_eq!(PopulationType::from_code(Some("LV")), PopulationType::LikelyVoter);
        assert_eq!(PopulationType::from_code(Some(" lv ")), PopulationType::LikelyVoter);
        assert_eq!(PopulationType::from_code(Some("rv")), PopulationType::Other);
        assert_eq!(PopulationType::from_code(None), PopulationType::Other);
    }

    #[test]
    fn tier_tokens_match_serde() {
        for t in Tier::ALL {
            let s = serde_json::to_string(&t).unwrap();
            assert_eq!(s, format!("\"{}\"", t.token()));
        }
        assert_eq!(Tier::ALL[Tier::LeanOpposed.index()], Tier::LeanOpposed);
    }

    #[test]
    fn priors_reject_out_of_range() {
        let ok: Priors = serde_json::from_str(r#"{"A": 55.0, "B": 45.0}"#).unwrap();
        assert_eq!(ok.get("A"), Some(55.0));
        assert!(serde_json::from_str::<Priors>(r#"{"A": 120.0}"#).is_err());
    }

    #[test]
    fn favorable_half() {
        let fav: Vec<Tier> = Tier::ALL.iter().copied().filter(|t| t.is_favorable()).collect();
        assert_eq!(fav.len(), 4);
        assert!(!Tier::TiltOpposed.is_favorable());
    }
}
