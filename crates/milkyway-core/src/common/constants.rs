//! Survey geometry and background-model constants shared by the separation
//! and N-body programs.
//!
//! Angles carry their unit in the name (`_DEG` or `_RAD`); everything else is
//! kiloparsecs or magnitudes as noted.

pub const PI: f64 = std::f64::consts::PI;
pub const PI2: f64 = 2.0 * PI;
pub const PI_2: f64 = std::f64::consts::FRAC_PI_2;
pub const SQRT_2PI: f64 = 2.506_628_274_631_000_502_415_765_284_811_f64;

/// Longitude of the ascending node of the survey great circles.
pub const NODE_GC_COORDS_DEG: f64 = 95.0;
/// Angular separation between adjacent survey stripes.
pub const STRIPE_SEPARATION_DEG: f64 = 2.5;
pub const SURVEY_CENTER_DEC_DEG: f64 = 32.5;
/// Offset applied to `wedge * STRIPE_SEPARATION_DEG` to obtain eta.
pub const WEDGE_ETA_OFFSET_DEG: f64 = 57.5;
/// Wedges above this index lie in the southern survey and flip by pi.
pub const SOUTHERN_WEDGE_THRESHOLD: i32 = 46;

/// Sun to galactic centre distance used by the separation model (kpc).
pub const SUN_R0_KPC: f64 = 8.5;
/// Default Sun to galactic centre distance for the N-body scorer (kpc).
pub const NBODY_SUN_GC_DIST_KPC: f64 = 8.0;

/// Absolute magnitude of the turnoff stars used as tracers.
pub const ABSM: f64 = 4.2;
/// Single-sided Gaussian spread of the magnitude error.
pub const STDEV: f64 = 0.6;
pub const XR: f64 = 3.0 * STDEV;
/// `1 / (stdev * sqrt(2 pi))`
pub const GAUSS_COEFF: f64 = 1.0 / (STDEV * SQRT_2PI);
/// Detection-efficiency sigmoid `c0 / (exp(c1 * (g - c2)) + 1)`.
pub const SIGMOID_CURVE: [f64; 3] = [0.9402, 1.6171, 23.5877];

/// Streams with `|sigma|` at or below this use the narrow-Gaussian branch.
pub const SIGMA_LIMIT: f64 = 0.0001;
pub const MAX_CONVOLVE: u32 = 256;
/// `exp(-x)` underflows to zero for `x` beyond this.
pub const EXP_UNDERFLOW_EXPONENT: f64 = 745.2;
/// Scale applied to the summed exponentiated mixture weights.
pub const EXP_WEIGHT_SCALE: f64 = 0.001;

/// Upper bound on the lambda histogram bin count.
pub const MAX_HISTOGRAM_BINS: usize = 1 << 20;

/// Log-likelihood contributed by a star whose probability is exactly zero.
pub const ZERO_PROBABILITY_LOG_PENALTY: f64 = -238.0;
