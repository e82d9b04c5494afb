//! Background and stream densities at the convolution samples of one sky
//! direction.

use crate::common::constants::EXP_UNDERFLOW_EXPONENT;
use crate::numerics::{Vector3, dot3, norm_sq3, scale3, sub3};
use crate::separation::constants::{LbTrig, RPoint, StreamConstants};
use crate::separation::parameters::AstronomyParameters;

/// Galactic Cartesian position of a sample at distance `r` along `trig`.
pub fn sample_position(astronomy: &AstronomyParameters, trig: &LbTrig, r: f64) -> Vector3 {
    let zp = r * trig.bcos;
    [zp * trig.lcos - astronomy.sun_r0(), zp * trig.lsin, r * trig.bsin]
}

fn background_density(astronomy: &AstronomyParameters, point: &RPoint, xyz: Vector3) -> f64 {
    let rg = (xyz[0] * xyz[0] + xyz[1] * xyz[1] + astronomy.q_inv_sqr() * xyz[2] * xyz[2]).sqrt();
    let rs = rg + astronomy.r0();

    let mut density = if astronomy.fast_h_prob() {
        point.qw_r3_n / (rg * rs * rs * rs)
    } else {
        point.qw_r3_n / (rg.powf(astronomy.alpha()) * rs.powf(astronomy.alpha_delta3()))
    };

    if astronomy.aux_bg_profile() {
        let g = point.r_in_mag;
        let profile = astronomy.bg_a() * g * g + astronomy.bg_b() * g + astronomy.bg_c();
        density += point.qw_r3_n * profile;
    }
    density
}

/// Gaussian in the distance from the stream axis.
pub fn stream_density(stream: &StreamConstants, qw_r3_n: f64, xyz: Vector3) -> f64 {
    let offset = sub3(xyz, stream.c);
    let along = dot3(stream.a, offset);
    let distance_sq = norm_sq3(sub3(offset, scale3(stream.a, along)));

    if stream.large_sigma {
        return qw_r3_n * (-distance_sq * stream.sigma_sq2_inv).exp();
    }

    // sigma_sq2_inv may be huge here: keep 0 * inf and overflow out of the product
    if distance_sq == 0.0 {
        return qw_r3_n;
    }
    let exponent = distance_sq * stream.sigma_sq2_inv;
    if exponent.is_nan() || exponent > EXP_UNDERFLOW_EXPONENT {
        return 0.0;
    }
    qw_r3_n * (-exponent).exp()
}

/// Sums the background and every stream density over the samples in
/// `points`, in sample order. Stream sums are written to `stream_out`, which
/// must hold one slot per stream.
pub fn sample_densities(
    astronomy: &AstronomyParameters,
    streams: &[StreamConstants],
    trig: &LbTrig,
    points: &[RPoint],
    stream_out: &mut [f64],
) -> f64 {
    stream_out.fill(0.0);
    let mut background = 0.0;
    for point in points {
        let xyz = sample_position(astronomy, trig, point.r_point);
        background += background_density(astronomy, point, xyz);
        for (slot, stream) in stream_out.iter_mut().zip(streams) {
            *slot += stream_density(stream, point.qw_r3_n, xyz);
        }
    }
    background
}
