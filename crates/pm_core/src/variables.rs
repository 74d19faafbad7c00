//! variables.rs: engine configuration and run parameters.
//!
//! Everything the engine treats as "configuration" lives here as plain serde
//! data with reference defaults: region table, candidate roles, weighting and
//! filtering tables, manual overrides, the historical-lean fallback table,
//! tier cutpoints and simulation parameters. A config file only has to name
//! the candidates and list the regions; every other section may be omitted.
//!
//! `EngineConfig::validate` performs the domain checks after loading.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entities::Tier;
use crate::errors::CoreError;
use crate::ids::{CandidateId, RegionId};

/// ------------ Candidate roles ------------

/// Which candidates the engine treats specially.
///
/// `reference` and `opposed` are the two major candidates: priors are blended
/// for them, self-sponsored polls naming them are dropped, and the sign of
/// every margin is taken relative to `reference`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRoles {
    pub reference: CandidateId,
    pub opposed: CandidateId,
    /// Candidate shifted by the swing adjustment. Defaults to `opposed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swing_target: Option<CandidateId>,
    /// Candidate whose regional probabilities get the system bias factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_bias_target: Option<CandidateId>,
}

impl CandidateRoles {
    pub fn majors(&self) -> [&CandidateId; 2] {
        [&self.reference, &self.opposed]
    }

    pub fn is_major(&self, c: &CandidateId) -> bool {
        *c == self.reference || *c == self.opposed
    }

    pub fn swing_target(&self) -> &CandidateId {
        self.swing_target.as_ref().unwrap_or(&self.opposed)
    }
}

/// ------------ Region table ------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionEntry {
    pub name: RegionId,
    pub weight: u32,
    /// Cosmetic short code for presentation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
}

/// Region name → decision weight. Each region appears exactly once and the
/// weights sum to at most `u32::MAX`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RegionEntry>", into = "Vec<RegionEntry>")]
pub struct RegionTable {
    entries: BTreeMap<RegionId, RegionEntry>,
}

impl RegionTable {
    pub fn from_entries(entries: Vec<RegionEntry>) -> Result<Self, CoreError> {
        let mut map = BTreeMap::new();
        let mut total: u32 = 0;
        for e in entries {
            if e.weight == 0 {
                return Err(CoreError::DomainOutOfRange("region weight must be > 0"));
            }
            total = total
                .checked_add(e.weight)
                .ok_or(CoreError::DomainOutOfRange("total region weight exceeds u32"))?;
            if map.insert(e.name.clone(), e).is_some() {
                return Err(CoreError::DuplicateRegion);
            }
        }
        Ok(Self { entries: map })
    }

    pub fn weight(&self, region: &str) -> Option<u32> {
        self.entries.get(region).map(|e| e.weight)
    }

    pub fn abbreviation(&self, region: &str) -> Option<&str> {
        self.entries.get(region).and_then(|e| e.abbreviation.as_deref())
    }

    pub fn contains(&self, region: &str) -> bool {
        self.entries.contains_key(region)
    }

    /// Regions in canonical (sorted) order.
    pub fn regions(&self) -> impl Iterator<Item = &RegionId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> u32 {
        self.entries.values().map(|e| e.weight).sum()
    }

    /// `total / 2 + 1` (270 of 538).
    pub fn default_majority_threshold(&self) -> u32 {
        self.total_weight() / 2 + 1
    }
}

impl TryFrom<Vec<RegionEntry>> for RegionTable {
    type Error = CoreError;
    fn try_from(v: Vec<RegionEntry>) -> Result<Self, Self::Error> {
        Self::from_entries(v)
    }
}

impl From<RegionTable> for Vec<RegionEntry> {
    fn from(t: RegionTable) -> Self {
        t.entries.into_values().collect()
    }
}

/// ------------ Source weighting ------------

/// Externally supplied classification of poll sources.
///
/// Accepts both the descriptive keys and the short keys used by the published
/// bias lists (`blue`, `leanblue`, `leanred`, `red`, `relmissing`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightTable {
    #[serde(default, alias = "blue")]
    pub favorable: BTreeSet<String>,
    #[serde(default, alias = "leanblue")]
    pub lean_favorable: BTreeSet<String>,
    #[serde(default, alias = "leanred")]
    pub lean_opposed: BTreeSet<String>,
    #[serde(default, alias = "red")]
    pub opposed: BTreeSet<String>,
    #[serde(default)]
    pub unreliable: BTreeSet<String>,
    #[serde(default, alias = "relmissing")]
    pub no_data: BTreeSet<String>,
}

/// Multiplier per weight-table category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightMultipliers {
    pub favorable: f64,
    /// Shared by both lean categories.
    pub lean: f64,
    pub opposed: f64,
    pub unreliable: f64,
    pub no_data: f64,
    /// Sources on no list are not presumed biased: a mild boost.
    pub unclassified: f64,
    /// Record carries no source name at all.
    pub unset: f64,
}

impl Default for WeightMultipliers {
    fn default() -> Self {
        Self {
            favorable: 0.3,
            lean: 0.5,
            opposed: 0.3,
            unreliable: 0.1,
            no_data: 1.2,
            unclassified: 1.2,
            unset: 1.0,
        }
    }
}

/// Population weighting: fixed per type, or `sqrt(n) * scale` when the sample
/// size is known and `sample_scale` is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationWeighting {
    pub likely_voter: f64,
    pub other: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_scale: Option<f64>,
}

impl Default for PopulationWeighting {
    fn default() -> Self {
        Self { likely_voter: 1.5, other: 0.5, sample_scale: None }
    }
}

/// ------------ Record filtering ------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Record ids that never participate in any aggregate.
    pub excluded_ids: BTreeSet<u64>,
    /// Withdrawn or non-competitive candidates (case-insensitive).
    pub candidate_denylist: Vec<String>,
}

impl FilterConfig {
    pub fn is_denied(&self, candidate: &CandidateId) -> bool {
        self.candidate_denylist.iter().any(|d| candidate.eq_ignore_case(d))
    }
}

/// ------------ Blending and overrides ------------

/// `adjusted' = odds * prior + polls * adjusted` for the two major candidates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub odds: f64,
    pub polls: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self { odds: 0.05, polls: 0.95 }
    }
}

/// Named, additive correction for a known data anomaly in one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualOverride {
    pub region: RegionId,
    pub candidate: CandidateId,
    pub shift: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// ------------ Aggregation and tiers ------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationParams {
    /// Below this many qualifying records a region falls back to the lean table.
    pub min_sample_count: usize,
    /// Candidates whose mean support is below this are dropped.
    pub min_share: f64,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self { min_sample_count: 5, min_share: 0.15 }
    }
}

/// Seven descending margin cutpoints splitting the line into eight tiers.
///
/// `margin > c[0]` is solid-favorable, `margin > c[1]` likely-favorable, …,
/// and anything at or below `c[6]` is solid-opposed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 7]", into = "[f64; 7]")]
pub struct TierCutpoints([f64; 7]);

impl TierCutpoints {
    pub const REFERENCE: [f64; 7] = [8.0, 5.0, 2.0, 0.0, -2.0, -5.0, -8.0];

    pub fn new(c: [f64; 7]) -> Result<Self, CoreError> {
        let finite = c.iter().all(|v| v.is_finite());
        let descending = c.windows(2).all(|w| w[0] > w[1]);
        if finite && descending { Ok(Self(c)) } else { Err(CoreError::InvalidCutpoints) }
    }

    pub fn as_array(&self) -> &[f64; 7] {
        &self.0
    }
}

impl Default for TierCutpoints {
    fn default() -> Self {
        Self(Self::REFERENCE)
    }
}

impl TryFrom<[f64; 7]> for TierCutpoints {
    type Error = CoreError;
    fn try_from(c: [f64; 7]) -> Result<Self, Self::Error> {
        Self::new(c)
    }
}

impl From<TierCutpoints> for [f64; 7] {
    fn from(t: TierCutpoints) -> Self {
        t.0
    }
}

/// Historical-lean fallback for regions with too little live data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeanTable {
    /// Regions defaulting to the reference candidate.
    pub favorable: Vec<RegionId>,
    /// Regions defaulting to the opposed candidate.
    pub opposed: Vec<RegionId>,
    /// Named downgrades from the solid tier (e.g. a competitive district).
    pub tier_overrides: BTreeMap<RegionId, Tier>,
    /// Fixed probability for the favored candidate in named competitive regions.
    pub fixed_probability: BTreeMap<RegionId, f64>,
    /// Favored-candidate probability is drawn uniformly from `[min, max]`.
    pub base_probability_min: f64,
    pub base_probability_max: f64,
}

impl Default for LeanTable {
    fn default() -> Self {
        Self {
            favorable: Vec::new(),
            opposed: Vec::new(),
            tier_overrides: BTreeMap::new(),
            fixed_probability: BTreeMap::new(),
            base_probability_min: 98.0,
            base_probability_max: 100.0,
        }
    }
}

/// ------------ Simulation ------------

/// How wide each candidate's random variation is in the regional simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Spread {
    /// Majors use their prior probability, others their own share; capped.
    PriorScaled { max_points: f64 },
    /// Same spread for every candidate; needs no priors.
    Fixed { points: f64 },
}

impl Default for Spread {
    fn default() -> Self {
        Spread::PriorScaled { max_points: 20.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionSimParams {
    pub iterations: u32,
    /// Offset subtracted from each uniform draw; below 0.5 skews variation upward.
    pub bias_constant: f64,
    pub spread: Spread,
}

impl Default for RegionSimParams {
    fn default() -> Self {
        Self { iterations: 10_000, bias_constant: 0.45, spread: Spread::default() }
    }
}

/// Which trials divide the winner tallies in the system simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denominator {
    /// `tally / decisive_trials`: probabilities sum to 100 when any trial is decisive.
    #[default]
    DecisiveTrials,
    /// `tally / trials`: indecisive trials dilute every candidate.
    AllTrials,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSimParams {
    pub iterations: u32,
    /// Multiplier on `system_bias_target`'s regional probability before
    /// renormalizing (a bias correction for that candidate's polling).
    pub bias_factor: f64,
    /// Defaults to `total_weight / 2 + 1`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub majority_threshold: Option<u32>,
    pub denominator: Denominator,
}

impl Default for SystemSimParams {
    fn default() -> Self {
        Self {
            iterations: 50_000,
            bias_factor: 1.6,
            majority_threshold: None,
            denominator: Denominator::DecisiveTrials,
        }
    }
}

/// ------------ EngineConfig ------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub candidates: CandidateRoles,
    pub regions: RegionTable,
    #[serde(default)]
    pub multipliers: WeightMultipliers,
    #[serde(default)]
    pub population: PopulationWeighting,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub blend: BlendWeights,
    #[serde(default)]
    pub overrides: Vec<ManualOverride>,
    #[serde(default)]
    pub aggregation: AggregationParams,
    #[serde(default)]
    pub tiers: TierCutpoints,
    #[serde(default)]
    pub defaults: LeanTable,
    #[serde(default)]
    pub region_sim: RegionSimParams,
    #[serde(default)]
    pub system_sim: SystemSimParams,
}

fn pct(v: f64) -> bool {
    v.is_finite() && (0.0..=100.0).contains(&v)
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl EngineConfig {
    /// Config with reference defaults for everything but names and regions.
    pub fn new(candidates: CandidateRoles, regions: RegionTable) -> Self {
        Self {
            candidates,
            regions,
            multipliers: WeightMultipliers::default(),
            population: PopulationWeighting::default(),
            filter: FilterConfig::default(),
            blend: BlendWeights::default(),
            overrides: Vec::new(),
            aggregation: AggregationParams::default(),
            tiers: TierCutpoints::default(),
            defaults: LeanTable::default(),
            region_sim: RegionSimParams::default(),
            system_sim: SystemSimParams::default(),
        }
    }

    /// Majority threshold in effect (explicit, else `total / 2 + 1`).
    pub fn majority_threshold(&self) -> u32 {
        self.system_sim
            .majority_threshold
            .unwrap_or_else(|| self.regions.default_majority_threshold())
    }

    /// Domain checks; returns the first violation.
    pub fn validate(&self) -> Result<(), CoreError> {
        use CoreError::DomainOutOfRange as Dom;

        if self.candidates.reference == self.candidates.opposed {
            return Err(Dom("candidates.reference must differ from candidates.opposed"));
        }
        if self.regions.is_empty() {
            return Err(Dom("regions must not be empty"));
        }

        let m = &self.multipliers;
        if ![m.favorable, m.lean, m.opposed, m.unreliable, m.no_data, m.unclassified, m.unset]
            .into_iter()
            .all(positive)
        {
            return Err(Dom("multipliers must be > 0"));
        }

        let p = &self.population;
        if !positive(p.likely_voter) || !positive(p.other) {
            return Err(Dom("population weights must be > 0"));
        }
        if p.sample_scale.is_some_and(|s| !positive(s)) {
            return Err(Dom("population.sample_scale must be > 0"));
        }

        let b = &self.blend;
        if !(b.odds.is_finite() && b.odds >= 0.0 && b.polls.is_finite() && b.polls >= 0.0) {
            return Err(Dom("blend weights must be >= 0"));
        }

        if self.overrides.iter().any(|o| !o.shift.is_finite()) {
            return Err(Dom("override shift must be finite"));
        }

        let a = &self.aggregation;
        if a.min_sample_count == 0 {
            return Err(Dom("aggregation.min_sample_count must be >= 1"));
        }
        if !pct(a.min_share) {
            return Err(Dom("aggregation.min_share must be in [0, 100]"));
        }

        let d = &self.defaults;
        if !pct(d.base_probability_min)
            || !pct(d.base_probability_max)
            || d.base_probability_min > d.base_probability_max
        {
            return Err(Dom("defaults.base_probability range must lie in [0, 100]"));
        }
        if !d.fixed_probability.values().all(|v| pct(*v)) {
            return Err(Dom("defaults.fixed_probability must be in [0, 100]"));
        }
        if d.favorable.iter().any(|r| d.opposed.contains(r)) {
            return Err(Dom("a region cannot default to both candidates"));
        }

        let r = &self.region_sim;
        if r.iterations == 0 {
            return Err(Dom("region_sim.iterations must be > 0"));
        }
        if !(r.bias_constant.is_finite() && (0.0..=1.0).contains(&r.bias_constant)) {
            return Err(Dom("region_sim.bias_constant must be in [0, 1]"));
        }
        let spread_ok = match r.spread {
            Spread::PriorScaled { max_points } => positive(max_points),
            Spread::Fixed { points } => points.is_finite() && points >= 0.0,
        };
        if !spread_ok {
            return Err(Dom("region_sim.spread must be non-negative"));
        }

        let s = &self.system_sim;
        if s.iterations == 0 {
            return Err(Dom("system_sim.iterations must be > 0"));
        }
        if !positive(s.bias_factor) {
            return Err(Dom("system_sim.bias_factor must be > 0"));
        }
        let threshold = self.majority_threshold() as u64;
        if threshold == 0 || threshold > u64::from(self.regions.total_weight()) {
            return Err(Dom("majority threshold must be in 1..=total region weight"));
        }

        Ok(())
    }
}

/// ------------ Run parameters ------------

/// User-tunable parameters of one projection (not part of the config file).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub as_of: NaiveDate,
    pub window_days: u32,
    pub swing: f64,
    pub seed: u64,
}

impl RunParams {
    pub const DEFAULT_WINDOW_DAYS: u32 = 15;

    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of, window_days: Self::DEFAULT_WINDOW_DAYS, swing: 0.0, seed: 0 }
    }

    /// Swing must be finite and the window at least one day.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.swing.is_finite() {
            return Err(CoreError::DomainOutOfRange("swing"));
        }
        if self.window_days == 0 {
            return Err(CoreError::DomainOutOfRange("window_days"));
        }
        Ok(())
    }
}
