use crate::common::constants::ZERO_PROBABILITY_LOG_PENALTY;
use crate::coordinates::GalacticCoords;
use crate::domain::{MilkywayError, MilkywayResult};
use crate::numerics::Kahan;
use crate::separation::constants::{
    LbTrig, StreamConstants, StreamGauss, calc_g_prime, calc_reff_xr_rp3, r_points_at,
};
use crate::separation::parameters::{AstronomyParameters, Streams};
use crate::separation::probabilities::sample_densities;
use crate::separation::star_points::StarPoint;
use crate::separation::state::EvaluationState;
use serde::Serialize;
use std::io::Write;

/// Background and stream integrals after cutouts are subtracted.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalIntegrals {
    pub background: f64,
    pub streams: Vec<f64>,
}

/// The first integral minus every cutout. Requires a completed state.
pub fn final_integrals(state: &EvaluationState) -> MilkywayResult<FinalIntegrals> {
    if !state.is_complete() {
        return Err(MilkywayError::internal(
            "LIKELIHOOD.INCOMPLETE",
            "likelihood requested before every integral area completed",
        ));
    }
    let (main, cutouts) = state.integrals().split_first().ok_or_else(|| {
        MilkywayError::internal("LIKELIHOOD.INCOMPLETE", "state holds no integrals")
    })?;

    let mut background = main.background_integral;
    let mut streams = main.stream_integrals.clone();
    for cutout in cutouts {
        background -= cutout.background_integral;
        for (stream, value) in streams.iter_mut().zip(&cutout.stream_integrals) {
            *stream -= value;
        }
    }
    Ok(FinalIntegrals {
        background,
        streams,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeparationResults {
    pub background_integral: f64,
    pub stream_integrals: Vec<f64>,
    pub background_likelihood: f64,
    pub stream_likelihoods: Vec<f64>,
    pub likelihood: f64,
}

impl SeparationResults {
    /// Tagged text report.
    pub fn write_to(&self, sink: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            sink,
            "<background_integral> {:.15} </background_integral>",
            self.background_integral
        )?;
        writeln!(sink, "<stream_integral> {} </stream_integral>", join(&self.stream_integrals))?;
        writeln!(
            sink,
            "<background_likelihood> {:.15} </background_likelihood>",
            self.background_likelihood
        )?;
        writeln!(
            sink,
            "<stream_only_likelihood> {} </stream_only_likelihood>",
            join(&self.stream_likelihoods)
        )?;
        writeln!(sink, "<search_likelihood> {:.15} </search_likelihood>", self.likelihood)
    }
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|value| format!("{value:.15}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn log_probability(probability: f64, sum_exp_weights: f64, zero_count: &mut usize) -> f64 {
    if probability == 0.0 {
        *zero_count += 1;
        ZERO_PROBABILITY_LOG_PENALTY
    } else {
        (probability / sum_exp_weights).log10()
    }
}

/// Mean log10 mixture likelihood of `stars` given the final integrals.
pub fn star_likelihood(
    astronomy: &AstronomyParameters,
    streams: &Streams,
    stream_constants: &[StreamConstants],
    gauss: &StreamGauss,
    integrals: &FinalIntegrals,
    stars: &[StarPoint],
) -> MilkywayResult<SeparationResults> {
    if stars.is_empty() {
        return Err(MilkywayError::configuration(
            "CONFIG.STAR_POINTS",
            "likelihood needs at least one star",
        ));
    }
    if integrals.background == 0.0 || integrals.streams.iter().any(|value| *value == 0.0) {
        tracing::warn!(
            background = integrals.background,
            "zero integral; likelihood will not be finite"
        );
    }

    let number_streams = streams.len();
    let sum_exp_weights = streams.sum_exp_weights();
    let exp_background_weight = astronomy.exp_background_weight();

    let mut likelihood = Kahan::ZERO;
    let mut background_only = Kahan::ZERO;
    let mut stream_only = vec![Kahan::ZERO; number_streams];
    let mut stream_probs = vec![0.0; number_streams];
    let mut zero_stars = 0_usize;
    let mut zero_background = 0_usize;
    let mut zero_streams = 0_usize;

    for star in stars {
        let trig = LbTrig::from_galactic(GalacticCoords::from_degrees(star.l_deg, star.b_deg));
        let g_prime = calc_g_prime(star.r_kpc);
        let reff_xr_rp3 = calc_reff_xr_rp3(star.r_kpc, g_prime);
        let points = r_points_at(gauss, g_prime);

        let background =
            sample_densities(astronomy, stream_constants, &trig, &points, &mut stream_probs)
                * reff_xr_rp3;
        let background_term = (background / integrals.background) * exp_background_weight;

        let mut star_probability = background_term;
        for (index, probability) in stream_probs.iter_mut().enumerate() {
            *probability *= reff_xr_rp3;
            let stream_term =
                (*probability / integrals.streams[index]) * streams.epsilon_exp()[index];
            star_probability += stream_term;
            stream_only[index].add(log_probability(
                stream_term,
                sum_exp_weights,
                &mut zero_streams,
            ));
        }

        likelihood.add(log_probability(star_probability, sum_exp_weights, &mut zero_stars));
        background_only.add(log_probability(
            background_term,
            sum_exp_weights,
            &mut zero_background,
        ));
    }

    if zero_stars > 0 {
        tracing::warn!(
            stars = zero_stars,
            penalty = ZERO_PROBABILITY_LOG_PENALTY,
            "stars with zero probability"
        );
    }
    if zero_background + zero_streams > 0 {
        tracing::debug!(
            background = zero_background,
            streams = zero_streams,
            "zero single-component probabilities"
        );
    }

    let count = stars.len() as f64;
    Ok(SeparationResults {
        background_integral: integrals.background,
        stream_integrals: integrals.streams.clone(),
        background_likelihood: background_only.total() / count,
        stream_likelihoods: stream_only.iter().map(|sum| sum.total() / count).collect(),
        likelihood: likelihood.total() / count,
    })
}
