//! pm_pipeline: orchestration surface (normalize → blend → aggregate → simulate).
//! This crate does no file I/O itself: inputs arrive already loaded by `pm_io`,
//! math lives in `pm_algo`, and all mutable state sits in an explicit `Session`.

use std::fmt;

use pm_core::{EngineConfig, ExternalInput, PollRecord, Priors, WeightTable};
use pm_io::loader::LoadedInputs;

pub mod project;
pub mod session;

pub use project::{project, Diagnostics, Projection};
pub use session::{Begin, HistoryPoint, MemoKey, Session, Ticket};
pub use pm_io::hasher::InputDigests;
pub use pm_io::records::{DropReason, IngestReport};

/// Immutable inputs shared by every projection of a session.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub config: EngineConfig,
    pub records: Vec<PollRecord>,
    pub weights: ExternalInput<WeightTable>,
    pub priors: ExternalInput<Priors>,
    /// Present when the inputs came from files.
    pub ingest: Option<IngestReport>,
    pub digests: Option<InputDigests>,
}

impl Inputs {
    pub fn new(
        config: EngineConfig,
        records: Vec<PollRecord>,
        weights: ExternalInput<WeightTable>,
        priors: ExternalInput<Priors>,
    ) -> Self {
        Self { config, records, weights, priors, ingest: None, digests: None }
    }
}

impl From<LoadedInputs> for Inputs {
    fn from(l: LoadedInputs) -> Self {
        Self {
            config: l.config,
            records: l.records,
            weights: l.weights,
            priors: l.priors,
            ingest: Some(l.ingest),
            digests: Some(l.digests),
        }
    }
}

/// Single error surface for the pipeline orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    Io(String),
    Config(String),
    /// The caller cancelled the computation.
    Cancelled,
    /// Parameters changed while the computation ran; the result was discarded.
    Stale,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Io(m) => write!(f, "io: {m}"),
            PipelineError::Config(m) => write!(f, "config: {m}"),
            PipelineError::Cancelled => write!(f, "projection cancelled"),
            PipelineError::Stale => write!(f, "projection discarded: parameters changed"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<pm_io::IoError> for PipelineError {
    fn from(e: pm_io::IoError) -> Self {
        match e {
            pm_io::IoError::Config(m) => PipelineError::Config(m),
            other => PipelineError::Io(other.to_string()),
        }
    }
}

impl From<pm_algo::SimError> for PipelineError {
    fn from(e: pm_algo::SimError) -> Self {
        match e {
            pm_algo::SimError::Cancelled => PipelineError::Cancelled,
            pm_algo::SimError::NoIterations | pm_algo::SimError::MissingProbabilities => {
                PipelineError::Config(e.to_string())
            }
        }
    }
}
