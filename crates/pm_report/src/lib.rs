//! pm_report: presentation-facing plain data built from a finished projection.
//!
//! The report reads a `Projection` and never recomputes anything. Numbers are
//! formatted here once (two decimals, signed margins) so every renderer shows
//! the same text.

use pm_core::{OutcomeBasis, RegionTable, WinProbabilities};
use pm_pipeline::{HistoryPoint, Projection};
use serde::Serialize;

#[cfg(feature = "render_json")]
pub mod render_json;
#[cfg(feature = "render_text")]
pub mod render_text;

#[cfg(feature = "render_json")]
pub use render_json::render_json;
#[cfg(feature = "render_text")]
pub use render_text::render_text;

/// Candidates at or below this win probability (percent) are left out of texts.
pub const MIN_LISTED_PROBABILITY: f64 = 0.5;

/// Header block of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// `YYYY-MM-DD`
    pub as_of: String,
    pub window_days: u32,
    pub swing: String,
    pub seed: u64,
    /// `EV: A: n, B: m`
    pub tally_text: String,
    pub win_probability_text: Option<String>,
    pub trials_text: Option<String>,
    /// Degraded inputs and skipped regions, one sentence each.
    pub notes: Vec<String>,
}

/// One line of the region table. Keyed by region name; the abbreviation is cosmetic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionRow {
    pub region: String,
    pub abbreviation: Option<String>,
    pub weight: u32,
    pub basis: &'static str,
    pub leader: Option<String>,
    pub tier: &'static str,
    pub margin_text: String,
    pub support_text: String,
    pub win_probability_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub window_days: u32,
    pub swing: String,
    pub win_probability_text: Option<String>,
}

/// Top-level report model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportModel {
    pub summary: Summary,
    pub regions: Vec<RegionRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryRow>,
}

impl ReportModel {
    /// Attach a window history series (e.g. from `Session::history`).
    pub fn with_history(mut self, points: &[HistoryPoint]) -> Self {
        self.history = points
            .iter()
            .map(|p| HistoryRow {
                window_days: p.window_days,
                swing: signed_2dp(p.swing),
                win_probability_text: p.win_probability_by_candidate.as_ref().map(probability_text),
            })
            .collect();
        self
    }
}

/* ------------------------------ Formatting ------------------------------ */

/// `+1.25` / `-0.50`
pub fn signed_2dp(x: f64) -> String {
    format!("{x:+.2}")
}

/// `A: 61.20%, B: 38.80%`, listing candidates above [`MIN_LISTED_PROBABILITY`].
pub fn probability_text(probs: &WinProbabilities) -> String {
    probs
        .iter()
        .filter(|(_, p)| **p > MIN_LISTED_PROBABILITY)
        .map(|(c, p)| format!("{c}: {p:.2}%"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `EV: A: 300, B: 238`
pub fn tally_text<'a, I>(tally: I) -> String
where
    I: IntoIterator<Item = (&'a pm_core::CandidateId, &'a u32)>,
{
    let parts: Vec<String> = tally.into_iter().map(|(c, n)| format!("{c}: {n}")).collect();
    format!("EV: {}", parts.join(", "))
}

fn basis_token(b: OutcomeBasis) -> &'static str {
    match b {
        OutcomeBasis::Live => "live",
        OutcomeBasis::Default => "default",
    }
}

fn names<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

fn notes(p: &Projection) -> Vec<String> {
    let d = &p.diagnostics;
    let mut out = Vec::new();
    if let Some(r) = &d.weights_unavailable {
        out.push(format!("weight table unavailable ({r}); every source weighted 1.0"));
    }
    if let Some(r) = &d.priors_unavailable {
        out.push(format!("priors unavailable ({r}); poll support not blended"));
    }
    if !p.system.degraded_regions.is_empty() {
        out.push(format!(
            "system win probability unavailable; no win probabilities for: {}",
            names(&p.system.degraded_regions)
        ));
    }
    if !d.regions_skipped.is_empty() {
        out.push(format!("no outcome: {}", names(&d.regions_skipped)));
    }
    if let Some(ingest) = d.ingest.as_ref().filter(|i| i.dropped_total() > 0) {
        out.push(format!(
            "poll rows dropped at ingestion: {} of {}",
            ingest.dropped_total(),
            ingest.rows_seen
        ));
    }
    if !d.unknown_regions.is_empty() {
        out.push(format!("polls ignored for unknown regions: {}", names(&d.unknown_regions)));
    }
    out
}

/* ------------------------------ Assembly ------------------------------ */

/// Build the report model for one projection.
pub fn build_model(p: &Projection, regions: &RegionTable) -> ReportModel {
    let trials_text = p.system.simulation.as_ref().map(|s| {
        format!(
            "{} trials, {} decisive, majority {}",
            s.trials, s.decisive_trials, s.majority_threshold
        )
    });

    let summary = Summary {
        as_of: p.params.as_of.format("%Y-%m-%d").to_string(),
        window_days: p.params.window_days,
        swing: signed_2dp(p.params.swing),
        seed: p.params.seed,
        tally_text: tally_text(&p.system.total_weight_by_candidate),
        win_probability_text: p.system.win_probability_by_candidate.as_ref().map(probability_text),
        trials_text,
        notes: notes(p),
    };

    let rows = p
        .regions
        .iter()
        .map(|o| RegionRow {
            region: o.region.to_string(),
            abbreviation: regions.abbreviation(o.region.as_str()).map(str::to_string),
            weight: regions.weight(o.region.as_str()).unwrap_or(0),
            basis: basis_token(o.basis),
            leader: o.leader.as_ref().map(|c| c.to_string()),
            tier: o.tier.token(),
            margin_text: signed_2dp(o.margin),
            support_text: o
                .support
                .iter()
                .map(|(c, v)| format!("{c}: {v:.2}%"))
                .collect::<Vec<_>>()
                .join(", "),
            win_probability_text: o.win_probabilities.as_ref().map(probability_text),
        })
        .collect();

    ReportModel { summary, regions: rows, history: Vec::new() }
}
