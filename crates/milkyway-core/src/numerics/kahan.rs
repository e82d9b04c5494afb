//! Compensated summation.
//!
//! The running value is split into `sum` and `correction`; the represented
//! total is `sum + correction`, which carries the low-order bits that plain
//! `+=` would drop. The fields are private so every increment goes through
//! [`Kahan::add`].

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kahan {
    sum: f64,
    correction: f64,
}

impl Kahan {
    pub const ZERO: Self = Self {
        sum: 0.0,
        correction: 0.0,
    };

    pub const fn new() -> Self {
        Self::ZERO
    }

    /// Rebuilds an accumulator from persisted parts without touching either
    /// value.
    pub const fn from_parts(sum: f64, correction: f64) -> Self {
        Self { sum, correction }
    }

    pub const fn sum(&self) -> f64 {
        self.sum
    }

    pub const fn correction(&self) -> f64 {
        self.correction
    }

    pub fn add(&mut self, item: f64) {
        let previous = self.sum;
        self.sum += item;
        self.correction += item - (self.sum - previous);
    }

    pub fn total(&self) -> f64 {
        self.sum + self.correction
    }

    pub fn reset(&mut self) {
        *self = Self::ZERO;
    }
}

impl FromIterator<f64> for Kahan {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut accumulator = Kahan::new();
        for item in iter {
            accumulator.add(item);
        }
        accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::Kahan;

    #[test]
    fn recovers_bits_lost_by_naive_summation() {
        let mut naive = 1.0_f64;
        let mut compensated = Kahan::new();
        compensated.add(1.0);

        for _ in 0..10_000 {
            naive += 1.0e-16;
            compensated.add(1.0e-16);
        }

        assert_eq!(naive, 1.0);
        assert!((compensated.total() - 1.0 - 1.0e-12).abs() <= 1.0e-15);
    }

    #[test]
    fn cancellation_is_tracked_in_correction() {
        let mut accumulator = Kahan::new();
        accumulator.add(1.0e16);
        accumulator.add(1.0);
        accumulator.add(-1.0e16);

        assert_eq!(accumulator.total(), 1.0);
    }

    #[test]
    fn from_parts_round_trips_exact_bits() {
        let accumulator = Kahan::from_parts(0.1, -1.3e-18);
        assert_eq!(accumulator.sum().to_bits(), 0.1_f64.to_bits());
        assert_eq!(accumulator.correction().to_bits(), (-1.3e-18_f64).to_bits());
    }
}
