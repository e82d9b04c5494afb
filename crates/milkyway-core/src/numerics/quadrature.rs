use crate::common::constants::PI;
use crate::domain::MilkywayError;

/// Newton step size below which a Legendre root is accepted.
pub const GAUSS_LEGENDRE_TOLERANCE: f64 = 3.0e-11;
pub const GAUSS_LEGENDRE_MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendreRule {
    pub nodes: Vec<f64>,
    pub weights: Vec<f64>,
}

impl GaussLegendreRule {
    pub fn integrate<F: Fn(f64) -> f64>(&self, f: F) -> f64 {
        self.nodes
            .iter()
            .zip(&self.weights)
            .map(|(node, weight)| weight * f(*node))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuadratureError {
    #[error("gauss-legendre order must be at least 1, got {order}")]
    InvalidOrder { order: usize },
    #[error("gauss-legendre interval [{lower}, {upper}] must be finite")]
    NonFiniteInterval { lower: f64, upper: f64 },
    #[error(
        "gauss-legendre root {root_index} of order {order} not converged in {iterations} iterations"
    )]
    NoConvergence {
        order: usize,
        root_index: usize,
        iterations: usize,
    },
}

impl From<QuadratureError> for MilkywayError {
    fn from(error: QuadratureError) -> Self {
        match error {
            QuadratureError::NoConvergence { .. } => {
                MilkywayError::numeric("NUMERIC.GAUSS_LEGENDRE", error.to_string())
            }
            _ => MilkywayError::configuration("CONFIG.GAUSS_LEGENDRE", error.to_string()),
        }
    }
}

/// Gauss-Legendre nodes and weights on `[lower, upper]`, nodes ascending.
///
/// Roots of `P_n` are refined by Newton iteration from the Chebyshev guess
/// `cos(pi (i - 1/4) / (n + 1/2))` and mirrored around the interval midpoint.
pub fn gauss_legendre(
    lower: f64,
    upper: f64,
    order: usize,
) -> Result<GaussLegendreRule, QuadratureError> {
    if order == 0 {
        return Err(QuadratureError::InvalidOrder { order });
    }
    if !lower.is_finite() || !upper.is_finite() {
        return Err(QuadratureError::NonFiniteInterval { lower, upper });
    }

    let n = order as f64;
    let midpoint = 0.5 * (upper + lower);
    let half_length = 0.5 * (upper - lower);
    let mut nodes = vec![0.0; order];
    let mut weights = vec![0.0; order];

    for i in 1..=order.div_ceil(2) {
        let mut z = (PI * (i as f64 - 0.25) / (n + 0.5)).cos();
        let mut derivative = 0.0;
        let mut converged = false;

        for _ in 0..GAUSS_LEGENDRE_MAX_ITERATIONS {
            let (p_n, dp_n) = legendre_with_derivative(order, z);
            derivative = dp_n;
            let previous = z;
            z = previous - p_n / dp_n;
            if (z - previous).abs() <= GAUSS_LEGENDRE_TOLERANCE {
                converged = true;
                break;
            }
        }

        if !converged || !z.is_finite() {
            return Err(QuadratureError::NoConvergence {
                order,
                root_index: i - 1,
                iterations: GAUSS_LEGENDRE_MAX_ITERATIONS,
            });
        }

        let weight = 2.0 * half_length / ((1.0 - z * z) * derivative * derivative);
        nodes[i - 1] = midpoint - half_length * z;
        nodes[order - i] = midpoint + half_length * z;
        weights[i - 1] = weight;
        weights[order - i] = weight;
    }

    Ok(GaussLegendreRule { nodes, weights })
}

/// `(P_n(z), P_n'(z))` by the three-term recurrence.
fn legendre_with_derivative(order: usize, z: f64) -> (f64, f64) {
    let mut p1 = 1.0;
    let mut p2 = 0.0;
    for j in 1..=order {
        let jf = j as f64;
        let p3 = p2;
        p2 = p1;
        p1 = ((2.0 * jf - 1.0) * z * p2 - (jf - 1.0) * p3) / jf;
    }
    let derivative = order as f64 * (z * p1 - p2) / (z * z - 1.0);
    (p1, derivative)
}
