//! Separation likelihood: mixture-model integration over survey areas,
//! checkpointed evaluation state and the per-star likelihood.

pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod evaluate;
pub mod integrals;
pub mod likelihood;
pub mod parameters;
pub mod probabilities;
pub mod star_points;
pub mod state;

pub use checkpoint::{CheckpointStore, decode_checkpoint, encode_checkpoint};
pub use config::{IntegralAreaConfig, SeparationConfig, SeparationSetup};
pub use evaluate::{
    CheckpointPolicy, EvaluationOutcome, IntervalCheckpointer, evaluate, initial_state,
    run_evaluation,
};
pub use integrals::{
    IntegrationMonitor, IntegrationOutcome, IntegrationTables, Unmonitored, integrate,
};
pub use likelihood::{FinalIntegrals, SeparationResults, final_integrals, star_likelihood};
pub use parameters::{
    AstronomyParameters, AxisBounds, BackgroundParameters, IntegralArea, StreamParameters,
    Streams,
};
pub use star_points::{StarPoint, parse_star_points, read_star_points};
pub use state::{EvaluationPhase, EvaluationState, Integral};
