//! Loader: read local JSON inputs (manifest → config → polls → weights → priors)
//! and return a typed `LoadedInputs` for the pipeline. No network I/O.
//!
//! Config and polls are required: failing to read or parse them is an error.
//! Weights and priors are external inputs that may be unavailable; a failure
//! there is logged and recorded as `ExternalInput::Unavailable` instead.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use pm_core::{CandidateId, EngineConfig, ExternalInput, PollRecord, Priors, WeightTable};
use serde::Deserialize;
use tracing::{info, warn};

use crate::hasher::{sha256_file, InputDigests};
use crate::manifest::{self, InputPaths};
use crate::records::{ingest_text, IngestReport};
use crate::{looks_like_url, IoError, IoResult};

/// Everything a projection session needs, loaded and validated.
#[derive(Debug, Clone)]
pub struct LoadedInputs {
    pub config: EngineConfig,
    pub records: Vec<PollRecord>,
    pub ingest: IngestReport,
    pub weights: ExternalInput<WeightTable>,
    pub priors: ExternalInput<Priors>,
    pub digests: InputDigests,
}

fn read_text(what: &str, path: &Path) -> IoResult<String> {
    if looks_like_url(&path.to_string_lossy()) {
        return Err(IoError::Offline(format!("{what} must be a local path: {}", path.display())));
    }
    fs::read_to_string(path).map_err(|e| IoError::Path(format!("{what} {}: {e}", path.display())))
}

// ----------------------------- Config -----------------------------

/// Parse and domain-check an engine config.
pub fn parse_config(text: &str) -> IoResult<EngineConfig> {
    let cfg: EngineConfig = serde_json::from_str(text)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_config(path: &Path) -> IoResult<EngineConfig> {
    parse_config(&read_text("config", path)?)
}

// ----------------------------- Polls -----------------------------

pub fn load_polls(path: &Path) -> IoResult<(Vec<PollRecord>, IngestReport)> {
    let (records, report) = ingest_text(&read_text("polls", path)?)?;
    info!(
        rows = report.rows_seen,
        accepted = report.accepted,
        dropped = report.dropped_total(),
        "polls ingested"
    );
    Ok((records, report))
}

// ----------------------------- Weight table -----------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum WeightTableWire {
    List(Vec<WeightTable>),
    Single(WeightTable),
}

/// Weight table as a bare object, or a list of objects merged by union.
pub fn parse_weight_table(text: &str) -> IoResult<WeightTable> {
    let wire: WeightTableWire = serde_json::from_str(text)?;
    Ok(match wire {
        WeightTableWire::Single(t) => t,
        WeightTableWire::List(parts) => {
            parts.into_iter().fold(WeightTable::default(), |mut acc, t| {
                acc.favorable.extend(t.favorable);
                acc.lean_favorable.extend(t.lean_favorable);
                acc.lean_opposed.extend(t.lean_opposed);
                acc.opposed.extend(t.opposed);
                acc.unreliable.extend(t.unreliable);
                acc.no_data.extend(t.no_data);
                acc
            })
        }
    })
}

pub fn load_weight_table(path: &Path) -> IoResult<WeightTable> {
    parse_weight_table(&read_text("weights", path)?)
}

// ----------------------------- Priors -----------------------------

#[derive(Deserialize)]
struct PriceOutcome {
    name: CandidateId,
    price: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriorsWire {
    Prices(Vec<PriceOutcome>),
    Direct(Priors),
}

/// Priors as `{candidate: percent}` or decimal prices `[{name, price}]`
/// (implied probability `100 / price`).
pub fn parse_priors(text: &str) -> IoResult<Priors> {
    let wire: PriorsWire = serde_json::from_str(text)?;
    match wire {
        PriorsWire::Direct(p) => Ok(p),
        PriorsWire::Prices(outcomes) => {
            let mut map = BTreeMap::new();
            for o in outcomes {
                if !(o.price.is_finite() && o.price >= 1.0) {
                    return Err(IoError::Json {
                        pointer: format!("/{}/price", o.name),
                        msg: format!("decimal price must be >= 1, got {}", o.price),
                    });
                }
                map.insert(o.name, 100.0 / o.price);
            }
            Ok(Priors::new(map)?)
        }
    }
}

pub fn load_priors(path: &Path) -> IoResult<Priors> {
    parse_priors(&read_text("priors", path)?)
}

/// Load an optional external input, degrading to `Unavailable` on any failure.
pub fn load_external<T>(
    what: &str,
    path: Option<&Path>,
    load: impl FnOnce(&Path) -> IoResult<T>,
) -> ExternalInput<T> {
    let Some(path) = path else {
        warn!("{what} not supplied; continuing without it");
        return ExternalInput::unavailable(format!("{what} not supplied"));
    };
    match load(path) {
        Ok(v) => ExternalInput::Available(v),
        Err(e) => {
            warn!(error = %e, "{what} unavailable; continuing without it");
            ExternalInput::unavailable(e.to_string())
        }
    }
}

// ----------------------------- Orchestration -----------------------------

/// Load every input named by `paths`.
pub fn load_all(paths: &InputPaths) -> IoResult<LoadedInputs> {
    let config = load_config(&paths.config)?;
    for region in config.defaults.favorable.iter().chain(&config.defaults.opposed) {
        if !config.regions.contains(region.as_str()) {
            warn!(%region, "default-allocation region is not in the region table");
        }
    }

    let (records, ingest) = load_polls(&paths.polls)?;
    let weights = load_external("weight table", paths.weights.as_deref(), load_weight_table);
    let priors = load_external("priors", paths.priors.as_deref(), load_priors);

    let digests = InputDigests {
        polls_sha256: sha256_file(&paths.polls)?,
        config_sha256: sha256_file(&paths.config)?,
        weights_sha256: match (&weights, &paths.weights) {
            (ExternalInput::Available(_), Some(p)) => Some(sha256_file(p)?),
            _ => None,
        },
        priors_sha256: match (&priors, &paths.priors) {
            (ExternalInput::Available(_), Some(p)) => Some(sha256_file(p)?),
            _ => None,
        },
    };

    Ok(LoadedInputs { config, records, ingest, weights, priors, digests })
}

/// Load everything from a manifest file.
pub fn load_all_from_manifest(path: &Path) -> IoResult<LoadedInputs> {
    let paths = manifest::load_manifest(path)?;
    load_all(&paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_table_wire_forms() {
        let listed = parse_weight_table(
            r#"[{"red":["R1"],"blue":["B1"]},{"unreliable":["U1"],"relmissing":["M1"]}]"#,
        )
        .unwrap();
        assert!(listed.opposed.contains("R1"));
        assert!(listed.favorable.contains("B1"));
        assert!(listed.unreliable.contains("U1"));
        assert!(listed.no_data.contains("M1"));

        let bare = parse_weight_table(r#"{"lean_opposed":["LR"]}"#).unwrap();
        assert!(bare.lean_opposed.contains("LR"));
    }

    #[test]
    fn priors_from_prices() {
        let p = parse_priors(r#"[{"name":"A","price":2.0},{"name":"B","price":1.25}]"#).unwrap();
        assert_eq!(p.get("A"), Some(50.0));
        assert_eq!(p.get("B"), Some(80.0));
        assert!(parse_priors(r#"[{"name":"A","price":0.5}]"#).is_err());
    }

    #[test]
    fn priors_direct() {
        let p = parse_priors(r#"{"A": 61.5, "B": 38.5}"#).unwrap();
        assert_eq!(p.get("B"), Some(38.5));
        assert!(parse_priors(r#"{"A": 101}"#).is_err());
    }

    #[test]
    fn config_validation_surfaces_as_config_error() {
        let err = parse_config(
            r#"{"candidates":{"reference":"A","opposed":"A"},"regions":[{"name":"X","weight":1}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, IoError::Config(_)));
    }

    #[test]
    fn missing_optional_input_degrades() {
        let w: ExternalInput<WeightTable> = load_external("weights", None, load_weight_table);
        assert!(!w.is_available());
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("weights.json");
        fs::write(&bad, "not json").unwrap();
        let w = load_external("weights", Some(&bad), load_weight_table);
        assert!(w.reason().is_some());
    }
}
