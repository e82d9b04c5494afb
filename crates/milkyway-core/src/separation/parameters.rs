use crate::common::constants::{EXP_WEIGHT_SCALE, MAX_CONVOLVE, SUN_R0_KPC};
use crate::domain::{MilkywayError, MilkywayResult};
use serde::{Deserialize, Serialize};

/// Smooth-halo shape as read from a parameter source.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BackgroundParameters {
    pub alpha: f64,
    pub q: f64,
    pub r0: f64,
    pub delta: f64,
    #[serde(default)]
    pub epsilon: f64,
    /// Quadratic-in-magnitude correction `a g^2 + b g + c`.
    #[serde(default)]
    pub a: f64,
    #[serde(default)]
    pub b: f64,
    #[serde(default)]
    pub c: f64,
}

impl Default for BackgroundParameters {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            q: 1.0,
            r0: 1.0,
            delta: 1.0,
            epsilon: 0.0,
            a: 0.0,
            b: 0.0,
            c: 0.0,
        }
    }
}

/// Background parameters with every derived quantity computed once.
///
/// Fields are private; the only way to build one is [`AstronomyParameters::new`],
/// so derived values always match the inputs they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AstronomyParameters {
    alpha: f64,
    r0: f64,
    delta: f64,
    q_inv_sqr: f64,
    alpha_delta3: f64,
    bg_a: f64,
    bg_b: f64,
    bg_c: f64,
    aux_bg_profile: bool,
    fast_h_prob: bool,
    exp_background_weight: f64,
    sun_r0: f64,
    wedge: i32,
    convolve: u32,
    number_streams: usize,
    number_integrals: usize,
}

impl AstronomyParameters {
    pub fn new(
        background: &BackgroundParameters,
        wedge: i32,
        convolve: u32,
        number_streams: usize,
        number_integrals: usize,
    ) -> MilkywayResult<Self> {
        if convolve == 0 || convolve > MAX_CONVOLVE || convolve % 2 != 0 {
            return Err(MilkywayError::configuration(
                "CONFIG.CONVOLVE",
                format!("convolve ({convolve}) must be > 0, <= {MAX_CONVOLVE} and even"),
            ));
        }
        if number_integrals == 0 {
            return Err(MilkywayError::configuration(
                "CONFIG.INTEGRALS",
                "at least one integral area is required",
            ));
        }
        for (field, value) in [
            ("alpha", background.alpha),
            ("q", background.q),
            ("r0", background.r0),
            ("delta", background.delta),
            ("epsilon", background.epsilon),
            ("a", background.a),
            ("b", background.b),
            ("c", background.c),
        ] {
            if !value.is_finite() {
                return Err(MilkywayError::configuration(
                    "CONFIG.BACKGROUND",
                    format!("background parameter '{field}' must be finite, got {value}"),
                ));
            }
        }
        if background.q == 0.0 {
            return Err(MilkywayError::configuration(
                "CONFIG.BACKGROUND",
                "background flattening q must be non-zero",
            ));
        }

        Ok(Self {
            alpha: background.alpha,
            r0: background.r0,
            delta: background.delta,
            q_inv_sqr: 1.0 / (background.q * background.q),
            alpha_delta3: 3.0 - background.alpha + background.delta,
            bg_a: background.a,
            bg_b: background.b,
            bg_c: background.c,
            aux_bg_profile: background.a != 0.0 || background.b != 0.0 || background.c != 0.0,
            fast_h_prob: background.alpha == 1.0 && background.delta == 1.0,
            exp_background_weight: background.epsilon.exp(),
            sun_r0: SUN_R0_KPC,
            wedge,
            convolve,
            number_streams,
            number_integrals,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn r0(&self) -> f64 {
        self.r0
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn q_inv_sqr(&self) -> f64 {
        self.q_inv_sqr
    }

    pub fn alpha_delta3(&self) -> f64 {
        self.alpha_delta3
    }

    pub fn bg_a(&self) -> f64 {
        self.bg_a
    }

    pub fn bg_b(&self) -> f64 {
        self.bg_b
    }

    pub fn bg_c(&self) -> f64 {
        self.bg_c
    }

    pub fn aux_bg_profile(&self) -> bool {
        self.aux_bg_profile
    }

    pub fn fast_h_prob(&self) -> bool {
        self.fast_h_prob
    }

    pub fn exp_background_weight(&self) -> f64 {
        self.exp_background_weight
    }

    pub fn sun_r0(&self) -> f64 {
        self.sun_r0
    }

    pub fn wedge(&self) -> i32 {
        self.wedge
    }

    pub fn convolve(&self) -> u32 {
        self.convolve
    }

    pub fn number_streams(&self) -> usize {
        self.number_streams
    }

    pub fn number_integrals(&self) -> usize {
        self.number_integrals
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct StreamParameters {
    /// Survey longitude of the stream's anchor point.
    #[serde(rename = "mu")]
    pub mu_deg: f64,
    /// Distance of the anchor point.
    #[serde(rename = "r")]
    pub r_kpc: f64,
    /// Polar angle of the stream axis.
    #[serde(rename = "theta")]
    pub theta_rad: f64,
    /// Azimuth of the stream axis.
    #[serde(rename = "phi")]
    pub phi_rad: f64,
    pub sigma: f64,
    /// Log mixture weight.
    pub epsilon: f64,
}

/// Ordered stream list with its exponentiated mixture weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Streams {
    parameters: Vec<StreamParameters>,
    epsilon_exp: Vec<f64>,
    sum_exp_weights: f64,
}

impl Streams {
    pub fn new(
        parameters: Vec<StreamParameters>,
        astronomy: &AstronomyParameters,
    ) -> MilkywayResult<Self> {
        if parameters.len() != astronomy.number_streams() {
            return Err(MilkywayError::configuration(
                "CONFIG.STREAM_COUNT",
                format!(
                    "expected {} streams, got {}",
                    astronomy.number_streams(),
                    parameters.len()
                ),
            ));
        }
        for (index, stream) in parameters.iter().enumerate() {
            for (field, value) in [
                ("mu", stream.mu_deg),
                ("r", stream.r_kpc),
                ("theta", stream.theta_rad),
                ("phi", stream.phi_rad),
                ("sigma", stream.sigma),
                ("epsilon", stream.epsilon),
            ] {
                if !value.is_finite() {
                    return Err(MilkywayError::configuration(
                        "CONFIG.STREAM",
                        format!("stream {index} parameter '{field}' must be finite, got {value}"),
                    ));
                }
            }
        }

        let epsilon_exp: Vec<f64> = parameters.iter().map(|stream| stream.epsilon.exp()).collect();
        let mut sum_exp_weights = astronomy.exp_background_weight();
        for weight in &epsilon_exp {
            sum_exp_weights += weight;
        }
        sum_exp_weights *= EXP_WEIGHT_SCALE;

        Ok(Self {
            parameters,
            epsilon_exp,
            sum_exp_weights,
        })
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn parameters(&self) -> &[StreamParameters] {
        &self.parameters
    }

    pub fn epsilon_exp(&self) -> &[f64] {
        &self.epsilon_exp
    }

    pub fn sum_exp_weights(&self) -> f64 {
        self.sum_exp_weights
    }
}

/// `min`/`max`/`steps` triple describing one grid axis.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AxisBounds {
    pub min: f64,
    pub max: f64,
    pub steps: u32,
}

impl AxisBounds {
    pub fn new(min: f64, max: f64, steps: u32) -> Self {
        Self { min, max, steps }
    }

    fn validate(&self, axis: &str) -> MilkywayResult<f64> {
        if self.steps == 0 {
            return Err(MilkywayError::configuration(
                "CONFIG.INTEGRAL_AREA",
                format!("{axis} steps must be > 0"),
            ));
        }
        if !self.min.is_finite() || !self.max.is_finite() || self.max <= self.min {
            return Err(MilkywayError::configuration(
                "CONFIG.INTEGRAL_AREA",
                format!(
                    "{axis} range must be finite with max > min, got [{}, {}]",
                    self.min, self.max
                ),
            ));
        }
        Ok((self.max - self.min) / f64::from(self.steps))
    }
}

/// One rectangular integration region. `mu` and `nu` are survey angles in
/// degrees; the line-of-sight axis is apparent magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegralArea {
    pub mu_min_deg: f64,
    pub mu_step_size_deg: f64,
    pub mu_steps: u32,
    pub nu_min_deg: f64,
    pub nu_step_size_deg: f64,
    pub nu_steps: u32,
    pub r_min: f64,
    pub r_step_size: f64,
    pub r_steps: u32,
}

impl IntegralArea {
    pub fn from_bounds(mu: AxisBounds, nu: AxisBounds, r: AxisBounds) -> MilkywayResult<Self> {
        let mu_step_size_deg = mu.validate("mu")?;
        let nu_step_size_deg = nu.validate("nu")?;
        let r_step_size = r.validate("r")?;
        Ok(Self {
            mu_min_deg: mu.min,
            mu_step_size_deg,
            mu_steps: mu.steps,
            nu_min_deg: nu.min,
            nu_step_size_deg,
            nu_steps: nu.steps,
            r_min: r.min,
            r_step_size,
            r_steps: r.steps,
        })
    }

    pub fn bin_count(&self) -> u64 {
        u64::from(self.nu_steps) * u64::from(self.mu_steps)
    }

    /// Centre of mu cell `mu_step`.
    pub fn mu_center_deg(&self, mu_step: u32) -> f64 {
        self.mu_min_deg + ((f64::from(mu_step) + 0.5) * self.mu_step_size_deg)
    }
}
