//! Scoring of N-body simulation output against an observed lambda histogram.

pub mod bodies;
pub mod config;
pub mod histogram;

pub use bodies::{Body, parse_bodies, read_bodies};
pub use config::HistogramParams;
pub use histogram::{
    HistBin, HistData, HistogramAngles, HistogramShape, NbodyScore, SimulatedHistogram,
    build_histogram, chi_square, lambda_of, parse_hist_data, read_hist_data, score_bodies,
    write_histogram,
};

use crate::domain::MilkywayResult;
use std::path::Path;

/// Reads the observed histogram and the simulated bodies and scores them.
pub fn nbody_chisq(
    params: &HistogramParams,
    histogram_path: &Path,
    bodies_path: &Path,
) -> MilkywayResult<NbodyScore> {
    let shape = HistogramShape::from_params(params)?;
    let observed = read_hist_data(histogram_path, shape.max_idx)?;
    let bodies = read_bodies(bodies_path)?;
    score_bodies(params, observed, &bodies)
}
