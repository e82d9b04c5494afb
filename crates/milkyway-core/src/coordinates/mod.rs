//! Survey great-circle, equatorial, galactic and Cartesian conversions.
//!
//! Every angle inside this module is in radians and every parameter or field
//! carries its unit as a suffix (`_rad`, `_deg`, `_kpc`). Degrees only appear
//! at the boundary: [`great_circle_to_galactic`] takes survey `(mu, nu)` in
//! degrees because survey grids are specified that way.

use crate::common::constants::{
    NODE_GC_COORDS_DEG, PI, PI2, PI_2, SOUTHERN_WEDGE_THRESHOLD, STRIPE_SEPARATION_DEG,
    SURVEY_CENTER_DEC_DEG, WEDGE_ETA_OFFSET_DEG,
};
use crate::numerics::Vector3;

/// Equatorial to galactic rotation (J2000, as used by SLALIB `eqgal`).
const EQUATORIAL_TO_GALACTIC: [[f64; 3]; 3] = [
    [-0.054_875_539_726, -0.873_437_108_010, -0.483_834_985_808],
    [0.494_109_453_312, -0.444_829_589_425, 0.746_982_251_810],
    [-0.867_666_135_858, -0.198_076_386_122, 0.455_983_795_705],
];

/// Beyond this many turns away from the target range the bound is reduced
/// with a remainder first so the stepping loop stays short.
const MAX_STEPPED_TURNS: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquatorialCoords {
    pub ra_rad: f64,
    pub dec_rad: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalacticCoords {
    pub l_rad: f64,
    pub b_rad: f64,
}

impl GalacticCoords {
    pub fn from_degrees(l_deg: f64, b_deg: f64) -> Self {
        Self {
            l_rad: l_deg.to_radians(),
            b_rad: b_deg.to_radians(),
        }
    }

    pub fn l_deg(&self) -> f64 {
        self.l_rad.to_degrees()
    }

    pub fn b_deg(&self) -> f64 {
        self.b_rad.to_degrees()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreatCircleCoords {
    pub mu_rad: f64,
    pub nu_rad: f64,
}

/// Reduces `angle_rad` into `[min_rad, max_rad)` by whole turns.
///
/// Non-finite input has no meaningful reduction and yields NaN.
pub fn angle_bound(angle_rad: f64, min_rad: f64, max_rad: f64) -> f64 {
    if !angle_rad.is_finite() {
        return f64::NAN;
    }

    let mut angle = angle_rad;
    if (angle - min_rad).abs() > MAX_STEPPED_TURNS * PI2 {
        angle = min_rad + (angle - min_rad).rem_euclid(PI2);
    }
    while angle < min_rad {
        angle += PI2;
    }
    while angle >= max_rad {
        angle -= PI2;
    }
    angle
}

/// Normalizes a (latitude, longitude) pair to latitude in `[-pi/2, pi/2]`
/// and longitude in `[0, 2pi)`. A latitude past a pole is reflected and the
/// longitude turned by pi; at exactly a pole the longitude is forced to 0.
pub fn bound_pair(theta_rad: f64, phi_rad: f64) -> (f64, f64) {
    let mut theta = angle_bound(theta_rad, -PI, PI);
    let mut phi = phi_rad;
    if theta.abs() > PI_2 {
        theta = PI - theta;
        phi += PI;
    }
    theta = angle_bound(theta, -PI, PI);
    phi = angle_bound(phi, 0.0, PI2);
    if theta.abs() == PI_2 {
        phi = 0.0;
    }
    (theta, phi)
}

pub fn wedge_eta(wedge: i32) -> f64 {
    let southern_flip = if wedge > SOUTHERN_WEDGE_THRESHOLD {
        PI
    } else {
        0.0
    };
    f64::from(wedge) * STRIPE_SEPARATION_DEG.to_radians()
        - WEDGE_ETA_OFFSET_DEG.to_radians()
        - southern_flip
}

pub fn wedge_inclination(wedge: i32) -> f64 {
    wedge_eta(wedge) + SURVEY_CENTER_DEC_DEG.to_radians()
}

pub fn great_circle_to_equatorial(
    mu_rad: f64,
    nu_rad: f64,
    inclination_rad: f64,
) -> EquatorialCoords {
    let node_rad = NODE_GC_COORDS_DEG.to_radians();
    let (sin_inc, cos_inc) = inclination_rad.sin_cos();

    let x2 = (mu_rad - node_rad).cos() * nu_rad.cos();
    let y2 = (mu_rad - node_rad).sin() * nu_rad.cos();
    let z2 = nu_rad.sin();
    let x1 = x2;
    let y1 = y2 * cos_inc - z2 * sin_inc;
    let z1 = y2 * sin_inc + z2 * cos_inc;

    let (dec_rad, ra_rad) = bound_pair(z1.asin(), y1.atan2(x1) + node_rad);
    EquatorialCoords { ra_rad, dec_rad }
}

/// Inverse of [`great_circle_to_equatorial`] for the same inclination.
pub fn equatorial_to_great_circle(
    equatorial: EquatorialCoords,
    inclination_rad: f64,
) -> GreatCircleCoords {
    let node_rad = NODE_GC_COORDS_DEG.to_radians();
    let (sin_inc, cos_inc) = inclination_rad.sin_cos();

    let x1 = (equatorial.ra_rad - node_rad).cos() * equatorial.dec_rad.cos();
    let y1 = (equatorial.ra_rad - node_rad).sin() * equatorial.dec_rad.cos();
    let z1 = equatorial.dec_rad.sin();
    let y2 = y1 * cos_inc + z1 * sin_inc;
    let z2 = -y1 * sin_inc + z1 * cos_inc;

    let (nu_rad, mu_rad) = bound_pair(z2.clamp(-1.0, 1.0).asin(), y2.atan2(x1) + node_rad);
    GreatCircleCoords { mu_rad, nu_rad }
}

pub fn equatorial_to_galactic(equatorial: EquatorialCoords) -> GalacticCoords {
    let v1 = spherical_to_cartesian(equatorial.ra_rad, equatorial.dec_rad);
    let v2 = rotate(&EQUATORIAL_TO_GALACTIC, v1);
    let (l, b) = cartesian_to_spherical(v2);
    let (b_rad, l_rad) = bound_pair(range_signed(b), range_positive(l));
    GalacticCoords { l_rad, b_rad }
}

/// Inverse of [`equatorial_to_galactic`] through the transposed rotation.
pub fn galactic_to_equatorial(galactic: GalacticCoords) -> EquatorialCoords {
    let v2 = spherical_to_cartesian(galactic.l_rad, galactic.b_rad);
    let v1 = rotate_transposed(&EQUATORIAL_TO_GALACTIC, v2);
    let (ra, dec) = cartesian_to_spherical(v1);
    let (dec_rad, ra_rad) = bound_pair(range_signed(dec), range_positive(ra));
    EquatorialCoords { ra_rad, dec_rad }
}

/// Survey `(mu, nu)` in degrees on the given wedge to galactic `(l, b)`.
pub fn great_circle_to_galactic(wedge: i32, mu_deg: f64, nu_deg: f64) -> GalacticCoords {
    let equatorial = great_circle_to_equatorial(
        mu_deg.to_radians(),
        nu_deg.to_radians(),
        wedge_inclination(wedge),
    );
    equatorial_to_galactic(equatorial)
}

/// Sun-centred `(l, b, r)` to galactic-centre Cartesian coordinates.
pub fn lbr_to_xyz(galactic: GalacticCoords, r_kpc: f64, sun_r0_kpc: f64) -> Vector3 {
    let (b_sin, b_cos) = galactic.b_rad.sin_cos();
    let (l_sin, l_cos) = galactic.l_rad.sin_cos();

    let z = r_kpc * b_sin;
    let zp = r_kpc * b_cos;
    let d = (sun_r0_kpc * sun_r0_kpc + zp * zp - 2.0 * sun_r0_kpc * zp * l_cos).sqrt();
    let x = (zp * zp - sun_r0_kpc * sun_r0_kpc - d * d) / (2.0 * sun_r0_kpc);
    let y = zp * l_sin;
    [x, y, z]
}

/// Galactic-centre Cartesian position to Sun-centred `(l, b)` and distance.
/// Longitude is returned in `[0, 2pi)`.
pub fn xyz_to_lbr(xyz: Vector3, sun_gc_dist_kpc: f64) -> (GalacticCoords, f64) {
    let xp = xyz[0] + sun_gc_dist_kpc;
    let planar = (xp * xp + xyz[1] * xyz[1]).sqrt();
    let mut l_rad = xyz[1].atan2(xp);
    if l_rad < 0.0 {
        l_rad += PI2;
    }
    let b_rad = xyz[2].atan2(planar);
    let r_kpc = (planar * planar + xyz[2] * xyz[2]).sqrt();
    (GalacticCoords { l_rad, b_rad }, r_kpc)
}

fn spherical_to_cartesian(a_rad: f64, b_rad: f64) -> Vector3 {
    let cos_b = b_rad.cos();
    [a_rad.cos() * cos_b, a_rad.sin() * cos_b, b_rad.sin()]
}

fn cartesian_to_spherical(v: Vector3) -> (f64, f64) {
    let r = (v[0] * v[0] + v[1] * v[1]).sqrt();
    let a = if r != 0.0 { v[1].atan2(v[0]) } else { 0.0 };
    let b = if v[2] != 0.0 { v[2].atan2(r) } else { 0.0 };
    (a, b)
}

fn rotate(matrix: &[[f64; 3]; 3], v: Vector3) -> Vector3 {
    let mut out = [0.0; 3];
    for (row, value) in matrix.iter().zip(out.iter_mut()) {
        *value = row[0] * v[0] + row[1] * v[1] + row[2] * v[2];
    }
    out
}

fn rotate_transposed(matrix: &[[f64; 3]; 3], v: Vector3) -> Vector3 {
    let mut out = [0.0; 3];
    for (column, value) in out.iter_mut().enumerate() {
        *value = matrix[0][column] * v[0] + matrix[1][column] * v[1] + matrix[2][column] * v[2];
    }
    out
}

/// Angle into `(-pi, pi]`.
fn range_signed(angle_rad: f64) -> f64 {
    let w = angle_rad % PI2;
    if w.abs() < PI {
        w
    } else {
        w - PI2.copysign(angle_rad)
    }
}

/// Angle into `[0, 2pi)`.
fn range_positive(angle_rad: f64) -> f64 {
    let w = angle_rad % PI2;
    if w >= 0.0 { w } else { w + PI2 }
}

#[cfg(test)]
mod tests {
    use super::{
        EquatorialCoords, GalacticCoords, angle_bound, bound_pair, equatorial_to_galactic,
        equatorial_to_great_circle, galactic_to_equatorial, great_circle_to_equatorial,
        great_circle_to_galactic, lbr_to_xyz, wedge_eta, wedge_inclination, xyz_to_lbr,
    };
    use crate::common::constants::{PI, PI2, PI_2, SUN_R0_KPC};

    #[test]
    fn angle_bound_lands_in_range_and_is_idempotent() {
        for angle in [-25.0, -PI2, -0.1, 0.0, 3.0, PI2, 7.5, 1.0e6, -3.3e9] {
            let once = angle_bound(angle, 0.0, PI2);
            assert!((0.0..PI2).contains(&once), "{angle} -> {once}");
            assert_eq!(angle_bound(once, 0.0, PI2), once);
        }
    }

    #[test]
    fn angle_bound_of_non_finite_input_is_nan() {
        assert!(angle_bound(f64::NAN, 0.0, PI2).is_nan());
        assert!(angle_bound(f64::INFINITY, 0.0, PI2).is_nan());
        assert!(angle_bound(f64::NEG_INFINITY, -PI, PI).is_nan());
    }

    #[test]
    fn bound_pair_reflects_over_the_pole() {
        let (theta, phi) = bound_pair(PI_2 + 0.25, 0.5);
        assert!((theta - (PI_2 - 0.25)).abs() <= 1.0e-15);
        assert!((phi - (0.5 + PI)).abs() <= 1.0e-15);
    }

    #[test]
    fn bound_pair_forces_zero_longitude_at_pole() {
        assert_eq!(bound_pair(PI_2, 1.2), (PI_2, 0.0));
        assert_eq!(bound_pair(-PI_2, 4.0), (-PI_2, 0.0));
    }

    #[test]
    fn southern_wedges_flip_by_pi() {
        let north = wedge_eta(46);
        let south = wedge_eta(47);
        assert!((south - north - (2.5_f64.to_radians() - PI)).abs() <= 1.0e-14);
        assert!((wedge_inclination(10) - wedge_eta(10) - 32.5_f64.to_radians()).abs() <= 1.0e-15);
    }

    #[test]
    fn great_circle_round_trips_through_galactic() {
        for (wedge, mu_deg, nu_deg) in [(9, 180.0, 0.0), (82, 200.5, 1.25), (86, 225.0, -1.1)] {
            let galactic = great_circle_to_galactic(wedge, mu_deg, nu_deg);
            let equatorial = galactic_to_equatorial(galactic);
            let recovered = equatorial_to_great_circle(equatorial, wedge_inclination(wedge));

            assert!(
                (recovered.mu_rad.to_degrees() - mu_deg).abs() <= 1.0e-8,
                "mu {} vs {}",
                recovered.mu_rad.to_degrees(),
                mu_deg
            );
            assert!((recovered.nu_rad.to_degrees() - nu_deg).abs() <= 1.0e-8);
        }
    }

    #[test]
    fn equatorial_galactic_round_trip() {
        let equatorial = EquatorialCoords {
            ra_rad: 3.1,
            dec_rad: -0.4,
        };
        let back = galactic_to_equatorial(equatorial_to_galactic(equatorial));
        assert!((back.ra_rad - equatorial.ra_rad).abs() <= 1.0e-10);
        assert!((back.dec_rad - equatorial.dec_rad).abs() <= 1.0e-10);
    }

    #[test]
    fn galactic_north_pole_maps_to_known_equatorial_position() {
        // NGP at (ra, dec) = (192.8595, 27.1283) deg
        let equatorial = galactic_to_equatorial(GalacticCoords::from_degrees(0.0, 90.0));
        assert!((equatorial.ra_rad.to_degrees() - 192.8595).abs() <= 1.0e-3);
        assert!((equatorial.dec_rad.to_degrees() - 27.1283).abs() <= 1.0e-3);
    }

    #[test]
    fn great_circle_equator_stays_on_equator_at_zero_inclination() {
        let equatorial = great_circle_to_equatorial(1.0, 0.0, 0.0);
        assert!(equatorial.dec_rad.abs() <= 1.0e-15);
        assert!((equatorial.ra_rad - 1.0).abs() <= 1.0e-14);
    }

    #[test]
    fn lbr_to_xyz_matches_direct_projection() {
        let galactic = GalacticCoords::from_degrees(30.0, 20.0);
        let r = 12.0;
        let xyz = lbr_to_xyz(galactic, r, SUN_R0_KPC);
        let expected_x = r * galactic.b_rad.cos() * galactic.l_rad.cos() - SUN_R0_KPC;
        assert!((xyz[0] - expected_x).abs() <= 1.0e-12);
        assert!((xyz[1] - r * galactic.b_rad.cos() * galactic.l_rad.sin()).abs() <= 1.0e-12);
        assert!((xyz[2] - r * galactic.b_rad.sin()).abs() <= 1.0e-12);
    }

    #[test]
    fn xyz_to_lbr_inverts_lbr_to_xyz() {
        let galactic = GalacticCoords::from_degrees(250.0, -35.0);
        let xyz = lbr_to_xyz(galactic, 21.0, SUN_R0_KPC);
        let (recovered, r) = xyz_to_lbr(xyz, SUN_R0_KPC);
        assert!((recovered.l_deg() - 250.0).abs() <= 1.0e-9);
        assert!((recovered.b_deg() + 35.0).abs() <= 1.0e-9);
        assert!((r - 21.0).abs() <= 1.0e-10);
        assert!(recovered.l_rad < 2.0 * PI);
    }
}
