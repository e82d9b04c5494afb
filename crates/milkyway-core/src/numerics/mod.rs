pub mod kahan;
pub mod quadrature;
pub mod vector;

pub use kahan::Kahan;
pub use quadrature::{
    GaussLegendreRule, QuadratureError, GAUSS_LEGENDRE_MAX_ITERATIONS, GAUSS_LEGENDRE_TOLERANCE,
    gauss_legendre,
};
pub use vector::{Vector3, dot3, norm_sq3, scale3, sub3};
