// crates/pm_cli/src/main.rs
//
// load → validate → project (+ history windows) → canonical artifacts → optional report.
// Logs go to stderr through tracing; stdout carries only the rendered report.

mod args;

mod exitcodes {
    pub const OK: i32 = 0;
    pub const VALIDATION: i32 = 2;
    pub const IO: i32 = 4;
    pub const ENGINE: i32 = 5;
}

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use args::{parse_and_validate as parse_cli, Args, RenderFormat};
use pm_io::{canonical_json, hasher};
use pm_io::loader::{self, LoadedInputs};
use pm_io::manifest::InputPaths;
use pm_pipeline::{Inputs, PipelineError, Projection, Session};
use pm_core::RunParams;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Central error type for CLI → exit-code mapping.
#[derive(Debug)]
enum MainError {
    /// Bad flags, malformed JSON, config domain violations, offline policy.
    Validation(String),
    /// Read/write/path failures.
    Io(String),
    /// The projection itself failed (cancelled or discarded).
    Engine(String),
}

impl std::fmt::Display for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainError::Validation(m) | MainError::Io(m) | MainError::Engine(m) => f.write_str(m),
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_cli() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("pm: error: {e}");
            return ExitCode::from(exitcodes::VALIDATION as u8);
        }
    };
    init_tracing(args.quiet);

    let rc = match run(&args) {
        Ok(()) => exitcodes::OK,
        Err(e) => {
            eprintln!("pm: error: {e}");
            map_error(&e)
        }
    };
    ExitCode::from(rc as u8)
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn map_error(e: &MainError) -> i32 {
    use exitcodes::*;
    match e {
        MainError::Validation(_) => VALIDATION,
        MainError::Io(_) => IO,
        MainError::Engine(_) => ENGINE,
    }
}

fn map_io_err(e: pm_io::IoError) -> MainError {
    use pm_io::IoError::*;
    match e {
        Json { pointer, msg } => MainError::Validation(format!("json {pointer}: {msg}")),
        Config(m) => MainError::Validation(format!("config: {m}")),
        Offline(m) => MainError::Validation(format!("offline: {m}")),
        Csv(m) => MainError::Validation(format!("csv: {m}")),
        Path(m) => MainError::Io(format!("path: {m}")),
        Hash(m) => MainError::Io(format!("hash: {m}")),
    }
}

fn map_pipeline_err(e: PipelineError) -> MainError {
    match e {
        PipelineError::Config(m) => MainError::Validation(m),
        PipelineError::Io(m) => MainError::Io(m),
        PipelineError::Cancelled | PipelineError::Stale => MainError::Engine(e.to_string()),
    }
}

fn load(args: &Args) -> Result<LoadedInputs, MainError> {
    let loaded = match &args.manifest {
        Some(m) => loader::load_all_from_manifest(m),
        None => {
            let polls = args.polls.clone().ok_or_else(|| MainError::Validation("--polls".into()))?;
            let config = args.config.clone().ok_or_else(|| MainError::Validation("--config".into()))?;
            loader::load_all(&InputPaths {
                polls,
                config,
                weights: args.weights.clone(),
                priors: args.priors.clone(),
            })
        }
    };
    loaded.map_err(map_io_err)
}

fn run(args: &Args) -> Result<(), MainError> {
    let loaded = load(args)?;
    if args.validate_only {
        info!(
            records = loaded.records.len(),
            dropped = loaded.ingest.dropped_total(),
            regions = loaded.config.regions.len(),
            "validate-only: inputs OK"
        );
        return Ok(());
    }

    let as_of = match args.as_of {
        Some(d) => d,
        None => loaded
            .records
            .iter()
            .map(|r| r.end_date)
            .max()
            .ok_or_else(|| MainError::Validation("no poll records; pass --as-of".into()))?,
    };
    let params = RunParams { as_of, window_days: args.window, swing: args.swing, seed: args.seed };
    let mut session = Session::new(Inputs::from(loaded), params);

    for &w in &args.history {
        session.set_window(w);
        session.projection().map_err(map_pipeline_err)?;
    }
    session.set_window(args.window);
    let projection = session.projection().map_err(map_pipeline_err)?;
    let history = if args.history.is_empty() { Vec::new() } else { session.history() };

    if let Some(out) = &args.out {
        write_artifacts(out, &projection, &history)?;
        info!(dir = %out.display(), "artifacts written");
    }

    if let Some(fmt) = args.render {
        let model = pm_report::build_model(&projection, &session.inputs().config.regions)
            .with_history(&history);
        print!("{}", render(fmt, &model)?);
    }
    Ok(())
}

fn write_artifacts(
    out_dir: &Path,
    projection: &Projection,
    history: &[pm_pipeline::HistoryPoint],
) -> Result<(), MainError> {
    fs::create_dir_all(out_dir)
        .map_err(|e| MainError::Io(format!("mkdir {}: {e}", out_dir.display())))?;
    canonical_json::write_canonical_file(&out_dir.join("projection.json"), projection)
        .map_err(|e| MainError::Io(format!("write projection.json: {e}")))?;
    let digest = hasher::sha256_canonical(projection)
        .map_err(|e| MainError::Io(format!("hash projection.json: {e}")))?;
    info!(sha256 = %digest, "projection.json written");
    if !history.is_empty() {
        canonical_json::write_canonical_file(&out_dir.join("history.json"), &history)
            .map_err(|e| MainError::Io(format!("write history.json: {e}")))?;
    }
    Ok(())
}

fn render(fmt: RenderFormat, model: &pm_report::ReportModel) -> Result<String, MainError> {
    match fmt {
        RenderFormat::Json => render_json(model),
        RenderFormat::Text => render_text(model),
    }
}

fn render_json(model: &pm_report::ReportModel) -> Result<String, MainError> {
    #[cfg(feature = "report-json")]
    {
        pm_report::render_json(model)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| MainError::Io(format!("render json: {e}")))
    }
    #[cfg(not(feature = "report-json"))]
    {
        let _ = model;
        Err(MainError::Validation("json renderer not enabled (build with feature `report-json`)".into()))
    }
}

fn render_text(model: &pm_report::ReportModel) -> Result<String, MainError> {
    #[cfg(feature = "report-text")]
    {
        Ok(pm_report::render_text(model))
    }
    #[cfg(not(feature = "report-text"))]
    {
        let _ = model;
        Err(MainError::Validation("text renderer not enabled (build with feature `report-text`)".into()))
    }
}
