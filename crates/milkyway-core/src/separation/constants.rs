//! Tables computed once per evaluation and read by the integration loop.

use crate::common::constants::{ABSM, GAUSS_COEFF, SIGMA_LIMIT, SIGMOID_CURVE, STDEV, XR};
use crate::coordinates::{GalacticCoords, great_circle_to_galactic, lbr_to_xyz};
use crate::domain::{MilkywayError, MilkywayResult};
use crate::numerics::{Vector3, gauss_legendre};
use crate::separation::parameters::{AstronomyParameters, IntegralArea, Streams};

/// Geometry of one stream in galactic Cartesian space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConstants {
    /// Unit vector along the stream axis.
    pub a: Vector3,
    /// Point on the axis at the stream's `(mu, 0)` anchor.
    pub c: Vector3,
    pub sigma_sq2_inv: f64,
    pub large_sigma: bool,
}

/// Builds one [`StreamConstants`] per stream.
///
/// Every stream is validated before anything is built, so a zero sigma
/// anywhere returns the error without a partial table.
pub fn get_stream_constants(
    astronomy: &AstronomyParameters,
    streams: &Streams,
) -> MilkywayResult<Vec<StreamConstants>> {
    if let Some(index) = streams
        .parameters()
        .iter()
        .position(|stream| stream.sigma == 0.0)
    {
        return Err(MilkywayError::configuration(
            "CONFIG.STREAM_SIGMA",
            format!("stream {index} has sigma == 0"),
        ));
    }

    Ok(streams
        .parameters()
        .iter()
        .map(|stream| {
            let (sin_theta, cos_theta) = stream.theta_rad.sin_cos();
            let (sin_phi, cos_phi) = stream.phi_rad.sin_cos();
            let anchor = great_circle_to_galactic(astronomy.wedge(), stream.mu_deg, 0.0);
            StreamConstants {
                a: [sin_theta * cos_phi, sin_theta * sin_phi, cos_theta],
                c: lbr_to_xyz(anchor, stream.r_kpc, astronomy.sun_r0()),
                sigma_sq2_inv: 1.0 / (2.0 * stream.sigma * stream.sigma),
                large_sigma: stream.sigma.abs() > SIGMA_LIMIT,
            }
        })
        .collect())
}

/// Magnitude offsets and weights for the line-of-sight convolution.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamGauss {
    pub dx: Vec<f64>,
    pub qgaus_w: Vec<f64>,
}

impl StreamGauss {
    pub fn len(&self) -> usize {
        self.dx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dx.is_empty()
    }
}

/// Gauss-Legendre rule on `[-1, 1]` with nodes spread to `3 * STDEV`.
///
/// The spread is the fixed magnitude-error width, not any stream's sigma.
pub fn prepare_stream_gauss(convolve: u32) -> MilkywayResult<StreamGauss> {
    let rule = gauss_legendre(-1.0, 1.0, convolve as usize)?;
    Ok(StreamGauss {
        dx: rule.nodes.iter().map(|node| 3.0 * STDEV * node).collect(),
        qgaus_w: rule.weights,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NuId {
    /// Centre of the nu cell.
    pub nu_deg: f64,
    /// Solid-angle differential of the cell.
    pub id: f64,
}

fn nu_cell(nu_min_deg: f64, nu_step_size_deg: f64, nu_step: u32) -> NuId {
    let nu = nu_min_deg + f64::from(nu_step) * nu_step_size_deg;
    let upper = (90.0 - nu - nu_step_size_deg).to_radians();
    let lower = (90.0 - nu).to_radians();
    NuId {
        nu_deg: nu + 0.5 * nu_step_size_deg,
        id: upper.cos() - lower.cos(),
    }
}

pub fn prepare_nu_constants(area: &IntegralArea) -> Vec<NuId> {
    (0..area.nu_steps)
        .map(|nu_step| nu_cell(area.nu_min_deg, area.nu_step_size_deg, nu_step))
        .collect()
}

/// Single-step form of [`prepare_nu_constants`]; the two agree bit for bit.
pub fn calc_nu_step(area: &IntegralArea, nu_step: u32) -> NuId {
    nu_cell(area.nu_min_deg, area.nu_step_size_deg, nu_step)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LbTrig {
    pub lcos: f64,
    pub lsin: f64,
    pub bcos: f64,
    pub bsin: f64,
}

impl LbTrig {
    pub fn from_galactic(galactic: GalacticCoords) -> Self {
        let (lsin, lcos) = galactic.l_rad.sin_cos();
        let (bsin, bcos) = galactic.b_rad.sin_cos();
        Self {
            lcos,
            lsin,
            bcos,
            bsin,
        }
    }
}

/// Memory order of the per-bin trig cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrigLayout {
    /// `nu_step * mu_steps + mu_step`; read by the scalar engine.
    RowMajor,
    /// `mu_step * nu_steps + nu_step`.
    ColumnMajor,
}

impl TrigLayout {
    pub fn index(self, area: &IntegralArea, nu_step: u32, mu_step: u32) -> usize {
        match self {
            Self::RowMajor => nu_step as usize * area.mu_steps as usize + mu_step as usize,
            Self::ColumnMajor => mu_step as usize * area.nu_steps as usize + nu_step as usize,
        }
    }
}

pub fn precalculate_lb_trig(
    astronomy: &AstronomyParameters,
    area: &IntegralArea,
    layout: TrigLayout,
) -> Vec<LbTrig> {
    let unset = LbTrig {
        lcos: 0.0,
        lsin: 0.0,
        bcos: 0.0,
        bsin: 0.0,
    };
    let mut trig = vec![unset; area.bin_count() as usize];
    for nu_step in 0..area.nu_steps {
        let nu = calc_nu_step(area, nu_step);
        for mu_step in 0..area.mu_steps {
            let galactic =
                great_circle_to_galactic(astronomy.wedge(), area.mu_center_deg(mu_step), nu.nu_deg);
            trig[layout.index(area, nu_step, mu_step)] = LbTrig::from_galactic(galactic);
        }
    }
    trig
}

/// Per distance step: centre magnitude and the volume/efficiency factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RConsts {
    pub g_prime: f64,
    pub irv_reff_xr_rp3: f64,
}

/// One convolution sample along the line of sight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RPoint {
    pub r_point: f64,
    /// Apparent magnitude of the sample.
    pub r_in_mag: f64,
    /// Quadrature weight times `r^3` times the magnitude-error Gaussian.
    pub qw_r3_n: f64,
}

/// Distance tables for one integral area: `r_steps` constants and
/// `r_steps * convolve` points, the points for one step contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct RTables {
    pub consts: Vec<RConsts>,
    points: Vec<RPoint>,
    convolve: usize,
}

impl RTables {
    pub fn points(&self, r_step: usize) -> &[RPoint] {
        let start = r_step * self.convolve;
        &self.points[start..start + self.convolve]
    }
}

/// Magnitude of a tracer at heliocentric distance `r_kpc`.
pub fn calc_g_prime(r_kpc: f64) -> f64 {
    5.0 * ((1000.0 * r_kpc).log10() - 1.0) + ABSM
}

/// Detection efficiency at magnitude `g`.
pub fn calc_reff(g: f64) -> f64 {
    let [c0, c1, c2] = SIGMOID_CURVE;
    c0 / ((c1 * (g - c2)).exp() + 1.0)
}

pub fn calc_reff_xr_rp3(r_kpc: f64, g_prime: f64) -> f64 {
    calc_reff(g_prime) * XR / (r_kpc * r_kpc * r_kpc)
}

/// Convolution samples around magnitude `g_prime`.
pub fn r_points_at(gauss: &StreamGauss, g_prime: f64) -> Vec<RPoint> {
    gauss
        .dx
        .iter()
        .zip(&gauss.qgaus_w)
        .map(|(dx, weight)| {
            let g = g_prime + dx;
            let r_point = 0.001 * 10.0_f64.powf(0.2 * (g - ABSM) + 1.0);
            let r3 = r_point * r_point * r_point;
            let n = GAUSS_COEFF * (-(dx * dx) / (2.0 * STDEV * STDEV)).exp();
            RPoint {
                r_point,
                r_in_mag: g,
                qw_r3_n: weight * r3 * n,
            }
        })
        .collect()
}

fn magnitude_to_distance(log_r: f64) -> f64 {
    10.0_f64.powf((log_r - 14.2) / 5.0)
}

pub fn prepare_r_tables(gauss: &StreamGauss, area: &IntegralArea) -> RTables {
    let mut consts = Vec::with_capacity(area.r_steps as usize);
    let mut points = Vec::with_capacity(area.r_steps as usize * gauss.len());

    for r_step in 0..area.r_steps {
        let log_r = area.r_min + f64::from(r_step) * area.r_step_size;
        let r = magnitude_to_distance(log_r);
        let next_r = magnitude_to_distance(log_r + area.r_step_size);

        let irv = (((next_r * next_r * next_r) - (r * r * r)) / 3.0 * area.mu_step_size_deg)
            .to_radians();
        let r_prime = 0.5 * (r + next_r);
        let g_prime = calc_g_prime(r_prime);

        consts.push(RConsts {
            g_prime,
            irv_reff_xr_rp3: irv * calc_reff_xr_rp3(r_prime, g_prime),
        });
        points.extend(r_points_at(gauss, g_prime));
    }

    RTables {
        consts,
        points,
        convolve: gauss.len(),
    }
}
