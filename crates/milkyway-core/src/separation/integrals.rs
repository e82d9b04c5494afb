//! Grid walk over every integral area.
//!
//! Bins are visited nu-outer, mu-inner. Inside a bin the distance steps are
//! Kahan-summed in order and the bin total is then added to the state, so a
//! run resumed at any bin boundary reproduces an uninterrupted run bit for
//! bit.

use crate::domain::{MilkywayError, MilkywayResult};
use crate::numerics::Kahan;
use crate::separation::constants::{
    LbTrig, NuId, RTables, StreamConstants, StreamGauss, TrigLayout, calc_nu_step,
    get_stream_constants, precalculate_lb_trig, prepare_nu_constants, prepare_r_tables,
    prepare_stream_gauss,
};
use crate::separation::parameters::{AstronomyParameters, IntegralArea, Streams};
use crate::separation::probabilities::sample_densities;
use crate::separation::state::{EvaluationPhase, EvaluationState};
use std::ops::ControlFlow;

/// Cached tables of one integral area.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaTables {
    pub area: IntegralArea,
    pub nu_consts: Vec<NuId>,
    pub lb_trig: Vec<LbTrig>,
    pub r_tables: RTables,
}

/// Everything the engine reads, built once per evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationTables {
    pub gauss: StreamGauss,
    pub stream_constants: Vec<StreamConstants>,
    pub areas: Vec<AreaTables>,
}

impl IntegrationTables {
    pub fn prepare(
        astronomy: &AstronomyParameters,
        streams: &Streams,
        areas: &[IntegralArea],
    ) -> MilkywayResult<Self> {
        let stream_constants = get_stream_constants(astronomy, streams)?;
        let gauss = prepare_stream_gauss(astronomy.convolve())?;
        let areas = areas
            .iter()
            .map(|area| AreaTables {
                area: *area,
                nu_consts: prepare_nu_constants(area),
                lb_trig: precalculate_lb_trig(astronomy, area, TrigLayout::RowMajor),
                r_tables: prepare_r_tables(&gauss, area),
            })
            .collect();
        Ok(Self {
            gauss,
            stream_constants,
            areas,
        })
    }

    pub fn integral_areas(&self) -> Vec<IntegralArea> {
        self.areas.iter().map(|tables| tables.area).collect()
    }

    pub fn total_bins(&self) -> u64 {
        self.areas.iter().map(|tables| tables.area.bin_count()).sum()
    }
}

/// Called by the engine between bins.
pub trait IntegrationMonitor {
    /// Runs after every bin, with the cursor already past it. Returning
    /// `Break` stops the walk at this boundary.
    fn bin_completed(&mut self, state: &mut EvaluationState) -> MilkywayResult<ControlFlow<()>>;

    /// Runs once after the last bin of the last area.
    fn integration_finished(&mut self, _state: &mut EvaluationState) -> MilkywayResult<()> {
        Ok(())
    }
}

/// Monitor that never interrupts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unmonitored;

impl IntegrationMonitor for Unmonitored {
    fn bin_completed(&mut self, _state: &mut EvaluationState) -> MilkywayResult<ControlFlow<()>> {
        Ok(ControlFlow::Continue(()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationOutcome {
    Completed,
    /// Stopped by the monitor; the state cursor names the next bin.
    Interrupted,
}

/// Background and per-stream totals of one `(nu, mu)` bin.
pub fn integrate_bin(
    astronomy: &AstronomyParameters,
    stream_constants: &[StreamConstants],
    tables: &AreaTables,
    nu: &NuId,
    trig: &LbTrig,
    stream_bins: &mut [Kahan],
    stream_scratch: &mut [f64],
) -> Kahan {
    let mut background = Kahan::ZERO;
    stream_bins.fill(Kahan::ZERO);

    for (r_step, consts) in tables.r_tables.consts.iter().enumerate() {
        let v_reff_xr_rp3 = nu.id * consts.irv_reff_xr_rp3;
        let bg = sample_densities(
            astronomy,
            stream_constants,
            trig,
            tables.r_tables.points(r_step),
            stream_scratch,
        );
        background.add(bg * v_reff_xr_rp3);
        for (bin, value) in stream_bins.iter_mut().zip(stream_scratch.iter()) {
            bin.add(value * v_reff_xr_rp3);
        }
    }
    background
}

fn checked_nu(tables: &AreaTables, nu_step: u32) -> MilkywayResult<NuId> {
    let single = calc_nu_step(&tables.area, nu_step);
    let cached = tables.nu_consts.get(nu_step as usize).copied().ok_or_else(|| {
        MilkywayError::internal(
            "INTEGRAL.NU_TABLE",
            format!("nu step {nu_step} outside the cached table"),
        )
    })?;
    if single.nu_deg.to_bits() != cached.nu_deg.to_bits()
        || single.id.to_bits() != cached.id.to_bits()
    {
        return Err(MilkywayError::internal(
            "INTEGRAL.NU_TABLE",
            format!("nu step {nu_step} disagrees with the cached table"),
        ));
    }
    Ok(cached)
}

/// Integrates from the state's cursor until every area is complete or the
/// monitor stops the walk.
pub fn integrate(
    astronomy: &AstronomyParameters,
    tables: &IntegrationTables,
    state: &mut EvaluationState,
    monitor: &mut dyn IntegrationMonitor,
) -> MilkywayResult<IntegrationOutcome> {
    if state.number_integrals() != tables.areas.len() {
        return Err(MilkywayError::internal(
            "INTEGRAL.SHAPE",
            format!(
                "state holds {} integrals but {} areas are configured",
                state.number_integrals(),
                tables.areas.len()
            ),
        ));
    }

    let number_streams = tables.stream_constants.len();
    let mut stream_bins = vec![Kahan::ZERO; number_streams];
    let mut stream_scratch = vec![0.0; number_streams];
    let mut stream_totals = vec![0.0; number_streams];
    let mut nu: Option<(u32, u32, NuId)> = None;

    while !state.is_complete() {
        let integral = state.current_integral();
        let area_tables = &tables.areas[integral as usize];
        let (nu_step, mu_step) = (state.nu_step(), state.mu_step());
        if state.phase() != EvaluationPhase::Running {
            state.set_phase(EvaluationPhase::Running);
        }
        if mu_step == 0 && nu_step == 0 {
            tracing::debug!(integral, bins = area_tables.area.bin_count(), "integrating area");
        }

        let nu_id = match nu {
            Some((cached_integral, cached_step, nu_id))
                if cached_integral == integral && cached_step == nu_step =>
            {
                nu_id
            }
            _ => {
                let nu_id = checked_nu(area_tables, nu_step)?;
                nu = Some((integral, nu_step, nu_id));
                nu_id
            }
        };
        let trig_index = TrigLayout::RowMajor.index(&area_tables.area, nu_step, mu_step);
        let trig = &area_tables.lb_trig[trig_index];

        let background = integrate_bin(
            astronomy,
            &tables.stream_constants,
            area_tables,
            &nu_id,
            trig,
            &mut stream_bins,
            &mut stream_scratch,
        );
        for (total, bin) in stream_totals.iter_mut().zip(&stream_bins) {
            *total = bin.total();
        }
        state.add_bin(background.total(), &stream_totals)?;
        state.advance(&area_tables.area);

        if state.current_integral() != integral {
            tracing::debug!(
                integral,
                background_integral = state.integrals()[integral as usize].background_integral,
                "area complete"
            );
        }

        if monitor.bin_completed(state)?.is_break() {
            tracing::info!(
                integral = state.current_integral(),
                nu_step = state.nu_step(),
                mu_step = state.mu_step(),
                "integration interrupted"
            );
            return Ok(IntegrationOutcome::Interrupted);
        }
    }

    state.set_phase(EvaluationPhase::Completed);
    monitor.integration_finished(state)?;
    Ok(IntegrationOutcome::Completed)
}
