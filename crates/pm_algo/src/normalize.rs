//! Record normalizer: filter poll records and attach credibility weights.
//!
//! Filters, in order: excluded record id, recency window
//! `[as_of - window_days, as_of]` (inclusive), candidate denylist, and polls
//! sponsored by one of the two major candidates. Survivors get
//! `adjusted = support * credibility * population`.

use chrono::{Days, NaiveDate};
use pm_core::{
    EngineConfig, PollRecord, PopulationType, PopulationWeighting, WeightTable, WeightedRecord,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::weighting::weight;

/// Drop counts from one normalization pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub input: usize,
    pub kept: usize,
    pub excluded_id: usize,
    pub outside_window: usize,
    pub denylisted: usize,
    pub self_sponsored: usize,
}

/// Earliest end date still inside the window.
pub fn window_start(as_of: NaiveDate, window_days: u32) -> NaiveDate {
    as_of
        .checked_sub_days(Days::new(u64::from(window_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Population multiplier for one record.
pub fn population_weight(record: &PollRecord, p: &PopulationWeighting) -> f64 {
    if let (Some(scale), Some(n)) = (p.sample_scale, record.sample_size) {
        if n > 0 {
            return f64::from(n).sqrt() * scale;
        }
    }
    match record.population {
        PopulationType::LikelyVoter => p.likely_voter,
        PopulationType::Other => p.other,
    }
}

/// Credibility of a record: the weaker of source and sponsor.
///
/// Without a weight table every name is neutral.
pub fn credibility_weight(record: &PollRecord, cfg: &EngineConfig, table: Option<&WeightTable>) -> f64 {
    let Some(table) = table else { return 1.0 };
    let m = &cfg.multipliers;
    let source = weight(record.source_name.as_deref(), table, m);
    let sponsor = weight(record.sponsor_name.as_deref(), table, m);
    source.min(sponsor)
}

fn self_sponsored(record: &PollRecord, cfg: &EngineConfig) -> bool {
    match record.sponsor_candidate.as_deref() {
        Some(s) => cfg.candidates.majors().iter().any(|c| c.eq_ignore_case(s)),
        None => false,
    }
}

/// Filter and weight `records`, preserving input order.
pub fn normalize(
    records: &[PollRecord],
    as_of: NaiveDate,
    window_days: u32,
    cfg: &EngineConfig,
    table: Option<&WeightTable>,
) -> (Vec<WeightedRecord>, NormalizeReport) {
    let start = window_start(as_of, window_days);
    let mut report = NormalizeReport { input: records.len(), ..NormalizeReport::default() };
    let mut out = Vec::with_capacity(records.len());

    for r in records {
        if cfg.filter.excluded_ids.contains(&r.record_id) {
            debug!(record_id = r.record_id, "excluded id");
            report.excluded_id += 1;
            continue;
        }
        if r.end_date < start || r.end_date > as_of {
            report.outside_window += 1;
            continue;
        }
        if cfg.filter.is_denied(&r.candidate) {
            debug!(record_id = r.record_id, candidate = %r.candidate, "denylisted candidate");
            report.denylisted += 1;
            continue;
        }
        if self_sponsored(r, cfg) {
            debug!(record_id = r.record_id, "self-sponsored poll");
            report.self_sponsored += 1;
            continue;
        }

        let credibility_weight = credibility_weight(r, cfg, table);
        let population_weight = population_weight(r, &cfg.population);
        out.push(WeightedRecord {
            record: r.clone(),
            credibility_weight,
            population_weight,
            adjusted_support: r.support_pct * credibility_weight * population_weight,
        });
    }

    report.kept = out.len();
    info!(
        input = report.input,
        kept = report.kept,
        excluded = report.excluded_id,
        outside_window = report.outside_window,
        denylisted = report.denylisted,
        self_sponsored = report.self_sponsored,
        "records normalized"
    );
    (out, report)
}
