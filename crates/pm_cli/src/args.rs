// crates/pm_cli/src/args.rs
//
// Offline CLI argument surface.
// - Exactly one of: --manifest  XOR  (--polls + --config [+ --weights] [+ --priors])
// - No networked paths (any scheme:// is rejected)
// - Run parameters: --as-of, --window, --swing, --seed, --history
// - Output: --out DIR (projection.json, history.json), --render json|text to stdout

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};

/// Report format written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RenderFormat {
    Json,
    Text,
}

/// Parsed CLI arguments.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "pm",
    disable_help_subcommand = true,
    about = "Offline, deterministic poll projection"
)]
pub struct Args {
    /// Manifest JSON naming every input (mutually exclusive with the explicit file flags).
    #[arg(long, conflicts_with_all = ["polls", "config", "weights", "priors"])]
    pub manifest: Option<PathBuf>,

    /// Poll rows (JSON array, JSON Lines, or CSV with a header row).
    #[arg(long)]
    pub polls: Option<PathBuf>,
    /// Engine configuration JSON.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Source weight table JSON (optional; credibility falls back to 1.0).
    #[arg(long)]
    pub weights: Option<PathBuf>,
    /// Priors JSON (optional; blend and region simulation are skipped without it).
    #[arg(long)]
    pub priors: Option<PathBuf>,

    /// Reference date of the recency window (YYYY-MM-DD). Defaults to the newest poll end date.
    #[arg(long, value_parser = parse_date)]
    pub as_of: Option<NaiveDate>,
    /// Recency window in days.
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u32).range(1..))]
    pub window: u32,
    /// Points added to the swing candidate's support in every live region.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true, value_parser = parse_swing)]
    pub swing: f64,
    /// Simulation seed. Decimal u64 or 0x-hex (up to 16 hex digits).
    #[arg(long, value_parser = parse_seed, default_value = "0")]
    pub seed: u64,
    /// Extra windows to project for the history series, comma separated (e.g. 7,15,30).
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(u32).range(1..))]
    pub history: Vec<u32>,

    /// Output directory for canonical artifacts. Nothing is written without it.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Render a report to stdout.
    #[arg(long, value_enum)]
    pub render: Option<RenderFormat>,

    /// Load and validate inputs only; do not project.
    #[arg(long)]
    pub validate_only: bool,

    /// Only warnings and errors on stderr.
    #[arg(long)]
    pub quiet: bool,
}

/// Errors surfaced by argument validation. Messages are short and stable.
#[derive(Debug)]
pub enum CliError {
    Missing(&'static str),
    NonLocalPath(String),
    NotFound(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CliError::*;
        match self {
            Missing(s) => write!(f, "missing required flag: {s}"),
            NonLocalPath(p) => write!(f, "path must be local file (no scheme): {p}"),
            NotFound(p) => write!(f, "file not found: {p}"),
        }
    }
}
impl std::error::Error for CliError {}

/// Decimal u64 or 0x-hex (1..=16 nybbles).
pub fn parse_seed(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty seed".into());
    }
    if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if rest.is_empty() || rest.len() > 16 || !rest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("hex seed must be 1..16 hex digits".into());
        }
        u64::from_str_radix(rest, 16).map_err(|_| "hex seed out of range".into())
    } else {
        s.parse::<u64>().map_err(|_| "decimal seed must be a valid u64".into())
    }
}

/// Finite percentage points; `NaN` and infinities are refused.
pub fn parse_swing(s: &str) -> Result<f64, String> {
    let v: f64 = s.trim().parse().map_err(|_| format!("expected a number, got {s:?}"))?;
    if !v.is_finite() {
        return Err("swing must be finite".into());
    }
    Ok(v)
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    if let Some(s) = p.to_str() {
        if pm_io::looks_like_url(s) || s.trim().to_ascii_lowercase().starts_with("file:") {
            return Err(CliError::NonLocalPath(s.to_string()));
        }
    }
    Ok(())
}

fn iter_all_paths(args: &Args) -> impl Iterator<Item = &Path> {
    [
        args.manifest.as_deref(),
        args.polls.as_deref(),
        args.config.as_deref(),
        args.weights.as_deref(),
        args.priors.as_deref(),
        args.out.as_deref(),
    ]
    .into_iter()
    .flatten()
}

/// Entry point used by main.rs. Clap usage errors exit with status 2 on their own.
pub fn parse_and_validate() -> Result<Args, CliError> {
    validate(Args::parse())
}

pub fn validate(mut args: Args) -> Result<Args, CliError> {
    for p in iter_all_paths(&args) {
        ensure_local_path(p)?;
    }

    if let Some(m) = &args.manifest {
        ensure_local_exists(m, "--manifest")?;
        args.manifest = args.manifest.take().map(|p| normalize_path(&p));
    } else {
        let polls = args.polls.as_ref().ok_or(CliError::Missing("--polls"))?;
        let config = args.config.as_ref().ok_or(CliError::Missing("--config"))?;
        ensure_local_exists(polls, "--polls")?;
        ensure_local_exists(config, "--config")?;
        // --weights / --priors may be missing on disk; that degrades at load time.
        args.polls = args.polls.take().map(|p| normalize_path(&p));
        args.config = args.config.take().map(|p| normalize_path(&p));
        args.weights = args.weights.take().map(|p| normalize_path(&p));
        args.priors = args.priors.take().map(|p| normalize_path(&p));
    }
    args.out = args.out.take().map(|p| normalize_path(&p));
    Ok(args)
}

fn ensure_local_exists(p: &Path, label: &'static str) -> Result<(), CliError> {
    let meta = fs::metadata(p).map_err(|_| CliError::NotFound(format!("{label} {}", p.display())))?;
    if !meta.is_file() {
        return Err(CliError::NotFound(format!("{label} {}", p.display())));
    }
    Ok(())
}

/// Absolute path; falls back to joining the CWD when the path does not exist yet.
fn normalize_path(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(p)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("pm").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn seed_parser_decimal_and_hex() {
        assert_eq!(parse_seed("42").unwrap(), 42u64);
        assert_eq!(parse_seed("0x2A").unwrap(), 42u64);
        assert!(parse_seed("0x").is_err());
        assert!(parse_seed("0xFFFFFFFFFFFFFFFFF").is_err());
        assert!(parse_seed("-1").is_err());
    }

    #[test]
    fn defaults_and_lists() {
        let a = args(&["--manifest", "m.json", "--history", "7,15,30", "--swing", "-2.5"]);
        assert_eq!(a.window, 15);
        assert_eq!(a.seed, 0);
        assert_eq!(a.history, vec![7, 15, 30]);
        assert_eq!(a.swing, -2.5);
        assert_eq!(a.render, None);
    }

    #[test]
    fn manifest_conflicts_with_explicit_files() {
        let r = Args::try_parse_from(["pm", "--manifest", "m.json", "--polls", "p.json"]);
        assert!(r.is_err());
    }

    #[test]
    fn explicit_mode_requires_config() {
        let dir = tempfile::tempdir().unwrap();
        let polls = dir.path().join("p.json");
        fs::write(&polls, "[]").unwrap();
        let a = args(&["--polls", polls.to_str().unwrap()]);
        assert!(matches!(validate(a), Err(CliError::Missing("--config"))));
    }

    #[test]
    fn urls_are_rejected() {
        let a = args(&["--manifest", "https://x/m.json"]);
        assert!(matches!(validate(a), Err(CliError::NonLocalPath(_))));
        assert!(ensure_local_path(Path::new("/tmp/file.json")).is_ok());
    }

    #[test]
    fn swing_must_be_finite() {
        assert_eq!(parse_swing("-2.5"), Ok(-2.5));
        for bad in ["NaN", "inf", "-infinity", "two"] {
            assert!(parse_swing(bad).is_err(), "{bad}");
        }
        assert!(Args::try_parse_from(["pm", "--manifest", "m.json", "--swing", "NaN"]).is_err());
    }

    #[test]
    fn as_of_must_be_iso() {
        assert!(parse_date("2024-11-01").is_ok());
        assert!(parse_date("11/1/24").is_err());
    }
}
