// crates/pm_io/src/manifest.rs
//
// A manifest names every input of one projection run:
// - required: polls, config
// - optional: weights (source classification), priors (market odds)
//
// Paths are resolved against the manifest's own directory unless absolute.
// Offline only: a path with a scheme is rejected before any filesystem access.
// Required inputs must exist and be files. Optional inputs are not checked
// here; a missing optional file degrades at load time instead of failing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{looks_like_url, IoError, IoResult};

/// External manifest as written on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub polls_path: String,
    pub config_path: String,
    #[serde(default)]
    pub weights_path: Option<String>,
    #[serde(default)]
    pub priors_path: Option<String>,
}

/// Input paths after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub polls: PathBuf,
    pub config: PathBuf,
    pub weights: Option<PathBuf>,
    pub priors: Option<PathBuf>,
}

fn join_under(base: &Path, rel: &str) -> PathBuf {
    let p = Path::new(rel);
    if p.is_absolute() { p.to_path_buf() } else { base.join(p) }
}

fn check_offline(field: &str, value: &str) -> IoResult<()> {
    if looks_like_url(value) {
        return Err(IoError::Offline(format!("{field} must be a local path: {value}")));
    }
    Ok(())
}

fn check_file(field: &str, p: &Path) -> IoResult<()> {
    let md = fs::metadata(p).map_err(|e| IoError::Path(format!("{field} {}: {e}", p.display())))?;
    if !md.is_file() {
        return Err(IoError::Path(format!("{field} is not a file: {}", p.display())));
    }
    Ok(())
}

/// Shape and offline checks. No I/O.
pub fn validate_manifest(man: &Manifest) -> IoResult<()> {
    for (field, value) in [("polls_path", &man.polls_path), ("config_path", &man.config_path)] {
        if value.trim().is_empty() {
            return Err(IoError::Path(format!("{field} must not be empty")));
        }
        check_offline(field, value)?;
    }
    for (field, value) in [("weights_path", &man.weights_path), ("priors_path", &man.priors_path)] {
        if let Some(v) = value {
            check_offline(field, v)?;
        }
    }
    Ok(())
}

/// Resolve against `base_dir` and existence-check the required inputs.
pub fn resolve_paths(base_dir: &Path, man: &Manifest) -> IoResult<InputPaths> {
    validate_manifest(man)?;
    let paths = InputPaths {
        polls: join_under(base_dir, &man.polls_path),
        config: join_under(base_dir, &man.config_path),
        weights: man.weights_path.as_deref().map(|p| join_under(base_dir, p)),
        priors: man.priors_path.as_deref().map(|p| join_under(base_dir, p)),
    };
    check_file("polls_path", &paths.polls)?;
    check_file("config_path", &paths.config)?;
    Ok(paths)
}

/// Read, parse, validate and resolve a manifest file.
pub fn load_manifest(path: &Path) -> IoResult<InputPaths> {
    check_offline("manifest", &path.to_string_lossy())?;
    let text = fs::read_to_string(path)
        .map_err(|e| IoError::Path(format!("manifest {}: {e}", path.display())))?;
    let man: Manifest = serde_json::from_str(&text)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    resolve_paths(base, &man)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn man(polls: &str) -> Manifest {
        Manifest {
            polls_path: polls.into(),
            config_path: "config.json".into(),
            weights_path: None,
            priors_path: Some("priors.json".into()),
        }
    }

    #[test]
    fn url_paths_rejected() {
        let err = validate_manifest(&man("https://example.org/polls.json")).unwrap_err();
        assert!(matches!(err, IoError::Offline(_)));
        let mut m = man("polls.json");
        m.weights_path = Some("file:///etc/weights.json".into());
        assert!(matches!(validate_manifest(&m), Err(IoError::Offline(_))));
    }

    #[test]
    fn unknown_fields_rejected() {
        let r = serde_json::from_str::<Manifest>(
            r#"{"polls_path":"p","config_path":"c","ballots_path":"b"}"#,
        );
        assert!(r.is_err());
    }

    #[test]
    fn resolves_relative_to_manifest_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("polls.json"), "[]").unwrap();
        fs::write(dir.path().join("config.json"), "{}").unwrap();
        let p = resolve_paths(dir.path(), &man("polls.json")).unwrap();
        assert_eq!(p.polls, dir.path().join("polls.json"));
        assert_eq!(p.priors, Some(dir.path().join("priors.json")));
        assert!(p.weights.is_none());
    }

    #[test]
    fn missing_required_file_is_path_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_paths(dir.path(), &man("nope.json")).unwrap_err();
        assert!(matches!(err, IoError::Path(_)));
    }
}
