//! Session: the explicit context object for interactive projection.
//!
//! Holds shared immutable inputs, the current run parameters, a memo of
//! finished projections keyed by `(window_days, swing)`, and an epoch counter.
//!
//! Computation is split so it can leave the caller's thread:
//! `begin()` hands out a `Ticket`, `Ticket::run()` computes, and `commit()`
//! stores the result only if no parameter changed in between. A parameter
//! change bumps the epoch and cancels the in-flight ticket; its result is
//! discarded as `Stale`, never merged into the newer state.

use std::collections::BTreeMap;
use std::sync::Arc;

use pm_core::{CancelToken, RunParams, WinProbabilities};
use serde::Serialize;
use tracing::debug;

use crate::project::{project, Projection};
use crate::{Inputs, PipelineError};

/// Memo key. The swing is keyed by its bit pattern (with `-0.0` folded into `0.0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemoKey {
    pub window_days: u32,
    swing_bits: u64,
}

impl MemoKey {
    pub fn new(window_days: u32, swing: f64) -> Self {
        let swing = if swing == 0.0 { 0.0 } else { swing };
        Self { window_days, swing_bits: swing.to_bits() }
    }

    pub fn swing(&self) -> f64 {
        f64::from_bits(self.swing_bits)
    }
}

struct MemoEntry {
    projection: Arc<Projection>,
    /// Commit order, for "latest swing wins" in the history view.
    seq: u64,
}

/// One point of the historical series: system win probability per window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub window_days: u32,
    pub swing: f64,
    pub win_probability_by_candidate: Option<WinProbabilities>,
}

/// A unit of work detached from the session.
#[derive(Debug, Clone)]
pub struct Ticket {
    key: MemoKey,
    epoch: u64,
    params: RunParams,
    cancel: CancelToken,
    inputs: Arc<Inputs>,
}

impl Ticket {
    pub fn key(&self) -> MemoKey {
        self.key
    }

    pub fn params(&self) -> &RunParams {
        &self.params
    }

    /// Compute the projection. Safe to call on another thread.
    pub fn run(&self) -> Result<Projection, PipelineError> {
        project(&self.inputs, &self.params, Some(&self.cancel))
    }
}

/// Result of [`Session::begin`].
#[derive(Debug)]
pub enum Begin {
    Cached(Arc<Projection>),
    Compute(Ticket),
}

pub struct Session {
    inputs: Arc<Inputs>,
    params: RunParams,
    memo: BTreeMap<MemoKey, MemoEntry>,
    epoch: u64,
    seq: u64,
    inflight: Option<CancelToken>,
}

impl Session {
    pub fn new(inputs: Inputs, params: RunParams) -> Self {
        Self {
            inputs: Arc::new(inputs),
            params,
            memo: BTreeMap::new(),
            epoch: 0,
            seq: 0,
            inflight: None,
        }
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub fn params(&self) -> &RunParams {
        &self.params
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn invalidate_inflight(&mut self) {
        self.epoch += 1;
        if let Some(t) = self.inflight.take() {
            debug!(epoch = self.epoch, "cancelling in-flight projection");
            t.cancel();
        }
    }

    pub fn set_window(&mut self, window_days: u32) {
        if window_days != self.params.window_days {
            self.params.window_days = window_days;
            self.invalidate_inflight();
        }
    }

    /// Non-finite swings are rejected and leave the session unchanged.
    pub fn set_swing(&mut self, swing: f64) -> Result<(), PipelineError> {
        if !swing.is_finite() {
            return Err(PipelineError::Config(format!("swing must be finite, got {swing}")));
        }
        if MemoKey::new(0, swing) != MemoKey::new(0, self.params.swing) {
            self.params.swing = swing;
            self.invalidate_inflight();
        }
        Ok(())
    }

    /// Drop every memoized projection.
    pub fn reset(&mut self) {
        self.memo.clear();
        self.invalidate_inflight();
    }

    fn current_key(&self) -> MemoKey {
        MemoKey::new(self.params.window_days, self.params.swing)
    }

    /// Cached projection for the current parameters, or a ticket to compute it.
    pub fn begin(&mut self) -> Begin {
        let key = self.current_key();
        if let Some(e) = self.memo.get(&key) {
            return Begin::Cached(Arc::clone(&e.projection));
        }
        if let Some(t) = self.inflight.take() {
            t.cancel();
        }
        let cancel = CancelToken::new();
        self.inflight = Some(cancel.clone());
        Begin::Compute(Ticket {
            key,
            epoch: self.epoch,
            params: self.params,
            cancel,
            inputs: Arc::clone(&self.inputs),
        })
    }

    /// Accept a ticket's result if the session has not moved on since `begin`.
    pub fn commit(
        &mut self,
        ticket: Ticket,
        result: Result<Projection, PipelineError>,
    ) -> Result<Arc<Projection>, PipelineError> {
        if ticket.epoch != self.epoch || ticket.cancel.is_cancelled() {
            debug!(ticket_epoch = ticket.epoch, epoch = self.epoch, "discarding stale projection");
            return Err(PipelineError::Stale);
        }
        self.inflight = None;
        let projection = Arc::new(result?);
        self.seq += 1;
        self.memo.insert(
            ticket.key,
            MemoEntry { projection: Arc::clone(&projection), seq: self.seq },
        );
        Ok(projection)
    }

    /// Synchronous convenience: begin, run on this thread, commit.
    pub fn projection(&mut self) -> Result<Arc<Projection>, PipelineError> {
        match self.begin() {
            Begin::Cached(p) => Ok(p),
            Begin::Compute(ticket) => {
                let result = ticket.run();
                self.commit(ticket, result)
            }
        }
    }

    pub fn is_memoized(&self, window_days: u32, swing: f64) -> bool {
        self.memo.contains_key(&MemoKey::new(window_days, swing))
    }

    /// System win probability per memoized window, ascending by window. When
    /// a window was computed under several swings the most recent one wins.
    pub fn history(&self) -> Vec<HistoryPoint> {
        let mut latest: BTreeMap<u32, (&MemoKey, &MemoEntry)> = BTreeMap::new();
        for (k, e) in &self.memo {
            let slot = latest.entry(k.window_days).or_insert((k, e));
            if e.seq > slot.1.seq {
                *slot = (k, e);
            }
        }
        latest
            .into_iter()
            .map(|(window_days, (k, e))| HistoryPoint {
                window_days,
                swing: k.swing(),
                win_probability_by_candidate: e.projection.system.win_probability_by_candidate.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_zero_swing_shares_key() {
        assert_eq!(MemoKey::new(15, -0.0), MemoKey::new(15, 0.0));
        assert_ne!(MemoKey::new(15, 0.5), MemoKey::new(15, 0.0));
        assert_eq!(MemoKey::new(7, 2.5).swing(), 2.5);
    }
}
