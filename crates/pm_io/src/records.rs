//! Ingestion boundary: heterogeneous raw rows → strict `PollRecord`s.
//!
//! Poll exports carry arbitrary columns, numbers-as-strings and several date
//! formats. This module is the only place that tolerates that: a row either
//! becomes a fully typed `PollRecord` or is dropped with a `DropReason` and
//! counted in the `IngestReport`. A malformed row is never an error.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use pm_core::{CandidateId, PollRecord, PopulationType, RegionId};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{IoError, IoResult};

const REGION: &[&str] = &["state", "region"];
const SOURCE: &[&str] = &["pollster", "source_name"];
const SPONSOR: &[&str] = &["sponsors", "sponsor_name"];
const SPONSOR_CANDIDATE: &[&str] = &["sponsor_candidate"];
const CANDIDATE: &[&str] = &["candidate_name", "candidate"];
const SUPPORT: &[&str] = &["pct", "support_pct"];
const SAMPLE: &[&str] = &["sample_size"];
const POPULATION: &[&str] = &["population", "population_type"];
const END_DATE: &[&str] = &["end_date"];
const RECORD_ID: &[&str] = &["poll_id", "record_id"];

/// Why a raw row did not become a `PollRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Line was not valid JSON, or not an object.
    NotAnObject,
    MissingRegion,
    MissingCandidate,
    /// Support missing, non-numeric, or outside `[0, 100]`.
    BadSupport,
    /// End date missing or in no recognised format.
    BadDate,
    MissingRecordId,
}

/// Counts from one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub rows_seen: usize,
    pub accepted: usize,
    pub dropped: BTreeMap<DropReason, usize>,
}

impl IngestReport {
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }

    fn count_drop(&mut self, reason: DropReason) {
        *self.dropped.entry(reason).or_insert(0) += 1;
    }
}

/// First present, non-null, non-blank value among `keys`.
fn field<'a>(row: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| row.get(*k)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

fn text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn integer(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    let f = number(v)?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

/// `YYYY-MM-DD`, `M/D/YY` (20YY) or `M/D/YYYY`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    let mut parts = s.split('/');
    let (m, d, y) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let month: u32 = m.parse().ok()?;
    let day: u32 = d.parse().ok()?;
    let year: i32 = match y.len() {
        2 => 2000 + y.parse::<i32>().ok()?,
        4 => y.parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Convert one raw row. Sample size and population are optional; an
/// unparseable sample size counts as unknown.
pub fn record_from_row(row: &Value) -> Result<PollRecord, DropReason> {
    let row = row.as_object().ok_or(DropReason::NotAnObject)?;

    let region = field(row, REGION)
        .and_then(text)
        .and_then(|s| RegionId::new(s).ok())
        .ok_or(DropReason::MissingRegion)?;
    let candidate = field(row, CANDIDATE)
        .and_then(text)
        .and_then(|s| CandidateId::new(s).ok())
        .ok_or(DropReason::MissingCandidate)?;
    let support_pct = field(row, SUPPORT)
        .and_then(number)
        .filter(|p| (0.0..=100.0).contains(p))
        .ok_or(DropReason::BadSupport)?;
    let end_date = field(row, END_DATE)
        .and_then(text)
        .and_then(|s| parse_date(&s))
        .ok_or(DropReason::BadDate)?;
    let record_id = field(row, RECORD_ID).and_then(integer).ok_or(DropReason::MissingRecordId)?;

    let sample_size = field(row, SAMPLE)
        .and_then(integer)
        .and_then(|n| u32::try_from(n).ok());
    let population = PopulationType::from_code(field(row, POPULATION).and_then(Value::as_str));

    Ok(PollRecord {
        region,
        source_name: field(row, SOURCE).and_then(text),
        sponsor_name: field(row, SPONSOR).and_then(text),
        sponsor_candidate: field(row, SPONSOR_CANDIDATE).and_then(text),
        candidate,
        support_pct,
        sample_size,
        population,
        end_date,
        record_id,
    })
}

/// Convert already-parsed rows, preserving input order.
pub fn ingest_rows<I>(rows: I) -> (Vec<PollRecord>, IngestReport)
where
    I: IntoIterator<Item = Value>,
{
    let mut report = IngestReport::default();
    let mut out = Vec::new();
    for (line, row) in rows.into_iter().enumerate() {
        report.rows_seen += 1;
        match record_from_row(&row) {
            Ok(r) => out.push(r),
            Err(reason) => {
                debug!(row = line, ?reason, "dropping poll row");
                report.count_drop(reason);
            }
        }
    }
    report.accepted = out.len();
    (out, report)
}

/// CSV export with a header row. Every cell is read as text; the row
/// conversion parses numbers and dates. The header must name a region and a
/// candidate column, otherwise the file is not a poll table.
pub fn ingest_csv(input: &str) -> IoResult<(Vec<PollRecord>, IngestReport)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input.as_bytes());
    let headers = reader.headers().map_err(|e| IoError::Csv(e.to_string()))?.clone();
    let has = |keys: &[&str]| headers.iter().any(|h| keys.contains(&h));
    if !(has(REGION) && has(CANDIDATE)) {
        return Err(IoError::Csv("header names no region or candidate column".into()));
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        match record {
            Ok(r) => {
                let row: Map<String, Value> = headers
                    .iter()
                    .zip(r.iter())
                    .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
                    .collect();
                rows.push(Value::Object(row));
            }
            Err(e) => {
                debug!(row = line, error = %e, "unreadable CSV row");
                rows.push(Value::Null);
            }
        }
    }
    Ok(ingest_rows(rows))
}

/// Parse a whole polls file: a JSON array of objects, JSON Lines, or CSV
/// with a header row (anything not starting with `[` or `{`).
///
/// A top-level array that is not valid JSON is an error. In JSON Lines and
/// CSV mode a bad line only drops that row.
pub fn ingest_text(input: &str) -> IoResult<(Vec<PollRecord>, IngestReport)> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('[') {
        let rows: Vec<Value> = serde_json::from_str(trimmed)?;
        return Ok(ingest_rows(rows));
    }
    if trimmed.is_empty() {
        return Ok(ingest_rows(Vec::new()));
    }
    if !trimmed.starts_with('{') {
        return ingest_csv(trimmed);
    }
    let rows = input
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<Value>(l).unwrap_or(Value::Null));
    let (records, report) = ingest_rows(rows);
    if records.is_empty() && report.dropped.get(&DropReason::NotAnObject) == Some(&report.rows_seen)
    {
        return Err(IoError::Json {
            pointer: "/".into(),
            msg: "neither a JSON array nor JSON Lines of objects".into(),
        });
    }
    Ok((records, report))
}
