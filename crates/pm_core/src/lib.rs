//! pm_core: Core types, configuration, ordering helpers, and deterministic RNG.
//!
//! This crate is **I/O-free**. It defines the stable types shared across the
//! engine (`pm_io`, `pm_algo`, `pm_pipeline`, `pm_report`, `pm_cli`).
//!
//! - Names: `RegionId`, `CandidateId`
//! - Records and outcomes: `PollRecord`, `WeightedRecord`, `RegionOutcome`, `SystemOutcome`
//! - Configuration: `EngineConfig` and its tables, `RunParams`
//! - External inputs that may be missing: `ExternalInput`
//! - Cooperative cancellation: `CancelToken`
//! - Seedable RNG (ChaCha20) behind the `RandomSource` trait

pub mod errors {
    use core::fmt;

    /// Minimal error set for core-domain validation & parsing.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum CoreError {
        InvalidName,
        InvalidPercentage,
        InvalidCutpoints,
        DuplicateRegion,
        DomainOutOfRange(&'static str),
    }

    impl fmt::Display for CoreError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                CoreError::InvalidName => write!(f, "invalid name"),
                CoreError::InvalidPercentage => write!(f, "percentage outside [0, 100]"),
                CoreError::InvalidCutpoints => {
                    write!(f, "tier cutpoints must be finite and strictly descending")
                }
                CoreError::DuplicateRegion => write!(f, "region listed more than once"),
                CoreError::DomainOutOfRange(k) => write!(f, "domain out of range: {k}"),
            }
        }
    }

    impl std::error::Error for CoreError {}
}

pub mod availability {
    //! Inputs fetched from outside the engine that may legitimately be absent.

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// An external dataset (priors, weight table) and whether it arrived.
    ///
    /// Missing data never aborts a run: the stage that needs it degrades and
    /// reports the `reason` in its diagnostics.
    #[derive(Debug, Clone, PartialEq)]
    pub enum ExternalInput<T> {
        Available(T),
        Unavailable { reason: String },
    }

    impl<T> ExternalInput<T> {
        pub fn unavailable(reason: impl Into<String>) -> Self {
            ExternalInput::Unavailable { reason: reason.into() }
        }

        pub fn get(&self) -> Option<&T> {
            match self {
                ExternalInput::Available(v) => Some(v),
                ExternalInput::Unavailable { .. } => None,
            }
        }

        pub fn is_available(&self) -> bool {
            matches!(self, ExternalInput::Available(_))
        }

        pub fn reason(&self) -> Option<&str> {
            match self {
                ExternalInput::Available(_) => None,
                ExternalInput::Unavailable { reason } => Some(reason),
            }
        }
    }

    impl<T> From<Option<T>> for ExternalInput<T> {
        fn from(v: Option<T>) -> Self {
            match v {
                Some(v) => ExternalInput::Available(v),
                None => ExternalInput::unavailable("not supplied"),
            }
        }
    }

    /// Shared cancellation flag, polled by long-running simulations.
    #[derive(Debug, Clone, Default)]
    pub struct CancelToken(Arc<AtomicBool>);

    impl CancelToken {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cancel(&self) {
            self.0.store(true, Ordering::Release);
        }

        pub fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::Acquire)
        }
    }

}

pub mod ids;
pub mod entities;
pub mod variables;
pub mod determinism;
pub mod rng;

pub use availability::{CancelToken, ExternalInput};
pub use entities::*;
pub use errors::CoreError;
pub use ids::{CandidateId, RegionId};
pub use rng::{RandomSource, ReplaySource, SimRng};
pub use variables::*;
