use crate::domain::{MilkywayError, MilkywayResult};
use crate::numerics::Kahan;
use crate::separation::parameters::IntegralArea;
use std::fmt::{Display, Formatter};

/// Where an [`EvaluationState`] is in its lifecycle. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationPhase {
    Fresh,
    Resumed,
    Running,
    Checkpointed,
    Completed,
}

impl EvaluationPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Resumed => "resumed",
            Self::Running => "running",
            Self::Checkpointed => "checkpointed",
            Self::Completed => "completed",
        }
    }
}

impl Display for EvaluationPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Accumulated results of one integral area.
#[derive(Debug, Clone, PartialEq)]
pub struct Integral {
    pub background_integral: f64,
    pub stream_integrals: Vec<f64>,
    pub probs: Vec<Kahan>,
}

impl Integral {
    pub fn new(number_streams: usize) -> Self {
        Self {
            background_integral: 0.0,
            stream_integrals: vec![0.0; number_streams],
            probs: vec![Kahan::ZERO; number_streams],
        }
    }
}

/// Resumable cursor over every integral area plus the running sums.
///
/// The cursor `(current_integral, nu_step, mu_step)` names the next bin to
/// integrate. Once the last bin of an area is added the area's totals are
/// stored in its [`Integral`] and the cursor moves to the next area.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationState {
    current_integral: u32,
    nu_step: u32,
    mu_step: u32,
    sum: Kahan,
    integrals: Vec<Integral>,
    number_streams: usize,
    phase: EvaluationPhase,
}

impl EvaluationState {
    pub fn new(number_integrals: usize, number_streams: usize) -> Self {
        Self {
            current_integral: 0,
            nu_step: 0,
            mu_step: 0,
            sum: Kahan::ZERO,
            integrals: (0..number_integrals)
                .map(|_| Integral::new(number_streams))
                .collect(),
            number_streams,
            phase: EvaluationPhase::Fresh,
        }
    }

    /// Rebuilds a state from persisted fields. Shapes must agree with
    /// `number_streams`.
    pub(crate) fn from_parts(
        cursor: (u32, u32, u32),
        sum: Kahan,
        integrals: Vec<Integral>,
        number_streams: usize,
    ) -> Self {
        let (current_integral, nu_step, mu_step) = cursor;
        Self {
            current_integral,
            nu_step,
            mu_step,
            sum,
            integrals,
            number_streams,
            phase: EvaluationPhase::Resumed,
        }
    }

    pub fn current_integral(&self) -> u32 {
        self.current_integral
    }

    pub fn nu_step(&self) -> u32 {
        self.nu_step
    }

    pub fn mu_step(&self) -> u32 {
        self.mu_step
    }

    pub fn sum(&self) -> &Kahan {
        &self.sum
    }

    pub fn integrals(&self) -> &[Integral] {
        &self.integrals
    }

    pub fn number_integrals(&self) -> usize {
        self.integrals.len()
    }

    pub fn number_streams(&self) -> usize {
        self.number_streams
    }

    pub fn phase(&self) -> EvaluationPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: EvaluationPhase) {
        self.phase = phase;
    }

    pub fn is_complete(&self) -> bool {
        self.current_integral as usize >= self.integrals.len()
    }

    /// Bins already integrated across all areas.
    pub fn completed_bins(&self, areas: &[IntegralArea]) -> u64 {
        let finished: u64 = areas
            .iter()
            .take(self.current_integral as usize)
            .map(IntegralArea::bin_count)
            .sum();
        match areas.get(self.current_integral as usize) {
            Some(area) => {
                finished
                    + u64::from(self.nu_step) * u64::from(area.mu_steps)
                    + u64::from(self.mu_step)
            }
            None => finished,
        }
    }

    /// Folds one bin's totals into the running sums of the current area.
    pub(crate) fn add_bin(&mut self, background: f64, streams: &[f64]) -> MilkywayResult<()> {
        let integral = self
            .integrals
            .get_mut(self.current_integral as usize)
            .ok_or_else(|| {
                MilkywayError::internal(
                    "STATE.CURSOR",
                    "bin added after every integral area completed",
                )
            })?;
        self.sum.add(background);
        for (probs, value) in integral.probs.iter_mut().zip(streams) {
            probs.add(*value);
        }
        Ok(())
    }

    /// Moves the cursor past the bin just added, completing the area when
    /// that was its last bin.
    pub(crate) fn advance(&mut self, area: &IntegralArea) {
        self.mu_step += 1;
        if self.mu_step < area.mu_steps {
            return;
        }
        self.mu_step = 0;
        self.nu_step += 1;
        if self.nu_step < area.nu_steps {
            return;
        }
        self.complete_integral();
    }

    fn complete_integral(&mut self) {
        if let Some(integral) = self.integrals.get_mut(self.current_integral as usize) {
            integral.background_integral = self.sum.total();
            for (stream_integral, probs) in
                integral.stream_integrals.iter_mut().zip(&integral.probs)
            {
                *stream_integral = probs.total();
            }
        }
        self.sum.reset();
        self.nu_step = 0;
        self.mu_step = 0;
        self.current_integral += 1;
    }

    /// Checks the cursor lies inside `areas` and the shapes match. Used on
    /// resume, where a mismatch means the checkpoint belongs to another run.
    pub fn validate_against(&self, areas: &[IntegralArea]) -> MilkywayResult<()> {
        if self.integrals.len() != areas.len() {
            return Err(MilkywayError::checksum(
                "CHECKPOINT.SHAPE",
                format!(
                    "checkpoint holds {} integrals, configuration has {}",
                    self.integrals.len(),
                    areas.len()
                ),
            ));
        }
        if self.is_complete() {
            if self.current_integral as usize == areas.len()
                && self.nu_step == 0
                && self.mu_step == 0
            {
                return Ok(());
            }
            return Err(MilkywayError::checksum(
                "CHECKPOINT.CURSOR",
                format!("integral index {} out of range", self.current_integral),
            ));
        }

        let area = &areas[self.current_integral as usize];
        if self.nu_step >= area.nu_steps || self.mu_step >= area.mu_steps {
            return Err(MilkywayError::checksum(
                "CHECKPOINT.CURSOR",
                format!(
                    "cursor (nu {}, mu {}) outside {}x{} grid of integral {}",
                    self.nu_step, self.mu_step, area.nu_steps, area.mu_steps, self.current_integral
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{EvaluationPhase, EvaluationState};
    use crate::domain::MilkywayErrorCategory;
    use crate::separation::parameters::{AxisBounds, IntegralArea};

    fn area(nu_steps: u32, mu_steps: u32) -> IntegralArea {
        IntegralArea::from_bounds(
            AxisBounds::new(0.0, 1.0, mu_steps),
            AxisBounds::new(0.0, 1.0, nu_steps),
            AxisBounds::new(16.0, 17.0, 1),
        )
        .expect("valid area")
    }

    #[test]
    fn fresh_state_is_zeroed() {
        let state = EvaluationState::new(2, 3);
        assert_eq!(state.phase(), EvaluationPhase::Fresh);
        assert_eq!(state.integrals().len(), 2);
        assert!(state.integrals().iter().all(|integral| {
            integral.background_integral == 0.0
                && integral.stream_integrals == vec![0.0; 3]
                && integral.probs.iter().all(|p| p.total() == 0.0)
        }));
        assert!(!state.is_complete());
    }

    #[test]
    fn cursor_walks_mu_inner_and_completes_areas() {
        let areas = [area(2, 2), area(1, 1)];
        let mut state = EvaluationState::new(2, 1);

        for bin in 0..4 {
            state.add_bin(1.0, &[0.5]).expect("in range");
            state.advance(&areas[0]);
            assert_eq!(state.completed_bins(&areas), bin + 1);
        }
        assert_eq!(state.current_integral(), 1);
        assert_eq!((state.nu_step(), state.mu_step()), (0, 0));
        assert_eq!(state.integrals()[0].background_integral, 4.0);
        assert_eq!(state.integrals()[0].stream_integrals, vec![2.0]);
        assert_eq!(state.sum().total(), 0.0);

        state.add_bin(3.0, &[1.0]).expect("in range");
        state.advance(&areas[1]);
        assert!(state.is_complete());
        assert_eq!(state.integrals()[1].background_integral, 3.0);
        state.validate_against(&areas).expect("complete cursor is valid");

        let error = state.add_bin(1.0, &[1.0]).expect_err("past the end");
        assert_eq!(error.category(), MilkywayErrorCategory::InternalError);
    }

    #[test]
    fn validation_rejects_foreign_cursor() {
        let areas = [area(2, 2)];
        let state = EvaluationState::from_parts(
            (0, 2, 0),
            crate::numerics::Kahan::ZERO,
            vec![super::Integral::new(1)],
            1,
        );
        let error = state.validate_against(&areas).expect_err("nu out of range");
        assert_eq!(error.category(), MilkywayErrorCategory::ChecksumFailure);

        let error = EvaluationState::new(2, 1)
            .validate_against(&areas)
            .expect_err("integral count");
        assert_eq!(error.placeholder(), "CHECKPOINT.SHAPE");
    }
}
