use crate::domain::MilkywayResult;
use crate::separation::checkpoint::CheckpointStore;
use crate::separation::config::SeparationSetup;
use crate::separation::integrals::{
    IntegrationMonitor, IntegrationOutcome, IntegrationTables, Unmonitored, integrate,
};
use crate::separation::likelihood::{SeparationResults, final_integrals, star_likelihood};
use crate::separation::star_points::StarPoint;
use crate::separation::state::{EvaluationPhase, EvaluationState};
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

/// How a run uses its checkpoint file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPolicy {
    pub store: CheckpointStore,
    pub interval: Duration,
    /// Start fresh even if a checkpoint exists.
    pub ignore_existing: bool,
    /// Remove the checkpoint once the run completes.
    pub cleanup_on_completion: bool,
    /// Stop after this many bins in this process.
    pub bin_budget: Option<u64>,
}

impl CheckpointPolicy {
    pub fn new(store: CheckpointStore, interval: Duration) -> Self {
        Self {
            store,
            interval,
            ignore_existing: false,
            cleanup_on_completion: false,
            bin_budget: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    Completed(SeparationResults),
    Interrupted {
        completed_bins: u64,
        total_bins: u64,
    },
}

/// Writes a checkpoint whenever `interval` has elapsed since the last one,
/// when the bin budget runs out and once at completion.
#[derive(Debug)]
pub struct IntervalCheckpointer<'a> {
    store: &'a CheckpointStore,
    interval: Duration,
    last_write: Instant,
    bin_budget: Option<u64>,
    bins_done: u64,
    writes: usize,
}

impl<'a> IntervalCheckpointer<'a> {
    pub fn new(store: &'a CheckpointStore, interval: Duration) -> Self {
        Self {
            store,
            interval,
            last_write: Instant::now(),
            bin_budget: None,
            bins_done: 0,
            writes: 0,
        }
    }

    pub fn with_bin_budget(mut self, bins: Option<u64>) -> Self {
        self.bin_budget = bins;
        self
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    fn checkpoint(&mut self, state: &mut EvaluationState) -> MilkywayResult<()> {
        self.store.write(state)?;
        self.last_write = Instant::now();
        self.writes += 1;
        Ok(())
    }
}

impl IntegrationMonitor for IntervalCheckpointer<'_> {
    fn bin_completed(&mut self, state: &mut EvaluationState) -> MilkywayResult<ControlFlow<()>> {
        self.bins_done += 1;
        if self.bin_budget.is_some_and(|budget| self.bins_done >= budget) && !state.is_complete() {
            self.checkpoint(state)?;
            state.set_phase(EvaluationPhase::Checkpointed);
            return Ok(ControlFlow::Break(()));
        }
        if self.last_write.elapsed() >= self.interval && !state.is_complete() {
            self.checkpoint(state)?;
            state.set_phase(EvaluationPhase::Checkpointed);
        }
        Ok(ControlFlow::Continue(()))
    }

    fn integration_finished(&mut self, state: &mut EvaluationState) -> MilkywayResult<()> {
        self.checkpoint(state)
    }
}

/// State to start from under `policy`.
pub fn initial_state(
    setup: &SeparationSetup,
    policy: Option<&CheckpointPolicy>,
) -> MilkywayResult<EvaluationState> {
    let number_streams = setup.streams.len();
    match policy {
        Some(policy) if !policy.ignore_existing => {
            policy.store.maybe_resume(&setup.areas, number_streams)
        }
        _ => Ok(EvaluationState::new(setup.areas.len(), number_streams)),
    }
}

/// Integrates from `state` under `monitor` and, once every area is done,
/// computes the likelihood of `stars`.
pub fn run_evaluation(
    setup: &SeparationSetup,
    tables: &IntegrationTables,
    stars: &[StarPoint],
    state: &mut EvaluationState,
    monitor: &mut dyn IntegrationMonitor,
) -> MilkywayResult<EvaluationOutcome> {
    let total_bins = tables.total_bins();
    tracing::info!(
        phase = %state.phase(),
        completed_bins = state.completed_bins(&setup.areas),
        total_bins,
        streams = setup.streams.len(),
        "integrating"
    );

    match integrate(&setup.astronomy, tables, state, monitor)? {
        IntegrationOutcome::Interrupted => Ok(EvaluationOutcome::Interrupted {
            completed_bins: state.completed_bins(&setup.areas),
            total_bins,
        }),
        IntegrationOutcome::Completed => {
            let integrals = final_integrals(state)?;
            let results = star_likelihood(
                &setup.astronomy,
                &setup.streams,
                &tables.stream_constants,
                &tables.gauss,
                &integrals,
                stars,
            )?;
            tracing::info!(
                likelihood = results.likelihood,
                stars = stars.len(),
                "evaluation complete"
            );
            Ok(EvaluationOutcome::Completed(results))
        }
    }
}

/// Full separation evaluation: tables, resume, integration and likelihood.
pub fn evaluate(
    setup: &SeparationSetup,
    stars: &[StarPoint],
    policy: Option<&CheckpointPolicy>,
) -> MilkywayResult<EvaluationOutcome> {
    let tables = IntegrationTables::prepare(&setup.astronomy, &setup.streams, &setup.areas)?;
    let mut state = initial_state(setup, policy)?;

    let Some(policy) = policy else {
        return run_evaluation(setup, &tables, stars, &mut state, &mut Unmonitored);
    };

    let mut monitor = IntervalCheckpointer::new(&policy.store, policy.interval)
        .with_bin_budget(policy.bin_budget);
    let outcome = run_evaluation(setup, &tables, stars, &mut state, &mut monitor)?;
    tracing::debug!(writes = monitor.writes(), "checkpoint writes this run");

    if matches!(outcome, EvaluationOutcome::Completed(_)) && policy.cleanup_on_completion {
        policy.store.remove()?;
        tracing::info!(path = %policy.store.path().display(), "checkpoint removed");
    }
    Ok(outcome)
}
