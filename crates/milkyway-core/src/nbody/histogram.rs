//! Lambda histogram of simulated bodies and its chi-square against an
//! observed histogram.

use crate::common::constants::MAX_HISTOGRAM_BINS;
use crate::coordinates::xyz_to_lbr;
use crate::domain::{MilkywayError, MilkywayResult};
use crate::nbody::bodies::Body;
use crate::nbody::config::HistogramParams;
use crate::numerics::{Kahan, Vector3};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Euler angles of the stream frame, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramAngles {
    pub phi_deg: f64,
    pub theta_deg: f64,
    pub psi_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistBin {
    pub use_bin: bool,
    pub lambda: f64,
    pub count: f64,
    pub err: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistData {
    pub angles: Option<HistogramAngles>,
    pub bins: Vec<HistBin>,
}

/// Bin layout derived from the raw range: `max_idx` equal bins starting at
/// the ceiling-aligned `start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramShape {
    pub max_idx: usize,
    pub start: f64,
    pub bin_size: f64,
}

impl HistogramShape {
    pub fn from_params(params: &HistogramParams) -> MilkywayResult<Self> {
        let range = params.end_raw - params.start_raw;
        if !(params.bin_size.is_finite() && params.bin_size > 0.0) {
            return Err(MilkywayError::configuration(
                "CONFIG.HISTOGRAM_PARAMS",
                format!("bin size must be positive, got {}", params.bin_size),
            ));
        }
        if !(range.is_finite() && range > 0.0) || !params.center.is_finite() {
            return Err(MilkywayError::configuration(
                "CONFIG.HISTOGRAM_PARAMS",
                format!(
                    "histogram range [{}, {}] around {} is not usable",
                    params.start_raw, params.end_raw, params.center
                ),
            ));
        }

        let max_idx = (range / params.bin_size).ceil();
        if max_idx > MAX_HISTOGRAM_BINS as f64 {
            return Err(MilkywayError::configuration(
                "CONFIG.HISTOGRAM_PARAMS",
                format!(
                    "bin size {} gives {max_idx} bins, limit is {MAX_HISTOGRAM_BINS}",
                    params.bin_size
                ),
            ));
        }
        Ok(Self {
            max_idx: max_idx as usize,
            start: (params.center - params.bin_size * max_idx / 2.0).ceil(),
            bin_size: params.bin_size,
        })
    }

    pub fn bin_index(&self, lambda: f64) -> Option<usize> {
        let index = ((lambda - self.start) / self.bin_size).floor();
        (index >= 0.0 && index < self.max_idx as f64).then_some(index as usize)
    }

    pub fn bin_center(&self, index: usize) -> f64 {
        self.start + self.bin_size * (index as f64 + 0.5)
    }

    pub fn end(&self) -> f64 {
        self.start + self.bin_size * self.max_idx as f64
    }
}

fn parse_angles(line: &str) -> Option<HistogramAngles> {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    let mut values = [0.0; 3];
    let mut parts = compact.split(',');
    for (slot, key) in values.iter_mut().zip(["phi=", "theta=", "psi="]) {
        *slot = parts.next()?.strip_prefix(key)?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    let [phi_deg, theta_deg, psi_deg] = values;
    Some(HistogramAngles {
        phi_deg,
        theta_deg,
        psi_deg,
    })
}

fn parse_bin(line: &str) -> Option<HistBin> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [use_bin, lambda, count, err] = fields.as_slice() else {
        return None;
    };
    let use_bin = match *use_bin {
        "0" => false,
        "1" => true,
        _ => return None,
    };
    let number = |text: &str| text.parse::<f64>().ok().filter(|value| value.is_finite());
    Some(HistBin {
        use_bin,
        lambda: number(*lambda)?,
        count: number(*count)?,
        err: number(*err)?,
    })
}

/// Parses an observed histogram, which must hold exactly `expected_bins`
/// rows of `useBin lambda count err`.
pub fn parse_hist_data(
    source: &str,
    origin: &str,
    expected_bins: usize,
) -> MilkywayResult<HistData> {
    let mut angles = None;
    let mut bins = Vec::with_capacity(expected_bins.min(source.lines().count()));

    for (index, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if angles.is_none() && bins.is_empty() && line.starts_with("phi") {
            angles = Some(parse_angles(line).ok_or_else(|| {
                MilkywayError::configuration(
                    "CONFIG.HISTOGRAM",
                    format!(
                        "{origin}:{}: expected 'phi = <f> , theta = <f> , psi = <f>', \
                         found '{line}'",
                        index + 1
                    ),
                )
            })?);
            continue;
        }
        let bin = parse_bin(line).ok_or_else(|| {
            MilkywayError::configuration(
                "CONFIG.HISTOGRAM",
                format!(
                    "{origin}:{}: expected '<useBin> <lambda> <count> <err>', found '{line}'",
                    index + 1
                ),
            )
        })?;
        bins.push(bin);
    }

    if bins.len() != expected_bins {
        return Err(MilkywayError::configuration(
            "CONFIG.HISTOGRAM",
            format!(
                "histogram '{origin}' has {} bins, expected {expected_bins}",
                bins.len()
            ),
        ));
    }
    Ok(HistData { angles, bins })
}

pub fn read_hist_data(path: &Path, expected_bins: usize) -> MilkywayResult<HistData> {
    let source = fs::read_to_string(path).map_err(|source| {
        MilkywayError::io_system(
            "IO.HISTOGRAM",
            format!("failed to read histogram '{}': {}", path.display(), source),
        )
    })?;
    parse_hist_data(&source, &path.display().to_string(), expected_bins)
}

/// Stream longitude lambda (degrees) of a galactocentric position.
pub fn lambda_of(position: Vector3, angles: &HistogramAngles, sun_gc_dist_kpc: f64) -> f64 {
    let (galactic, _) = xyz_to_lbr(position, sun_gc_dist_kpc);
    let (lsin, lcos) = galactic.l_rad.sin_cos();
    let (bsin, bcos) = galactic.b_rad.sin_cos();
    let (sin_phi, cos_phi) = angles.phi_deg.to_radians().sin_cos();
    let (sin_theta, cos_theta) = angles.theta_deg.to_radians().sin_cos();
    let (sin_psi, cos_psi) = angles.psi_deg.to_radians().sin_cos();

    let y = -(sin_psi * cos_phi + cos_theta * sin_phi * cos_psi) * bcos * lcos
        + (-sin_psi * sin_phi + cos_theta * cos_phi * cos_psi) * bcos * lsin
        + cos_psi * sin_theta * bsin;
    let x = (cos_psi * cos_phi - cos_theta * sin_phi * sin_psi) * bcos * lcos
        + (cos_psi * sin_phi + cos_theta * cos_phi * sin_psi) * bcos * lsin
        + sin_psi * sin_theta * bsin;
    y.atan2(x).to_degrees()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedHistogram {
    pub counts: Vec<u32>,
    pub total: u32,
}

/// Bins every body not flagged `ignore` whose lambda lands in a used bin.
pub fn build_histogram(
    bodies: &[Body],
    shape: &HistogramShape,
    angles: &HistogramAngles,
    sun_gc_dist_kpc: f64,
    observed: &HistData,
) -> SimulatedHistogram {
    let mut counts = vec![0_u32; shape.max_idx];
    let mut total = 0_u32;
    for body in bodies.iter().filter(|body| !body.ignore) {
        let lambda = lambda_of(body.position, angles, sun_gc_dist_kpc);
        let Some(index) = shape.bin_index(lambda) else {
            continue;
        };
        if observed.bins.get(index).is_some_and(|bin| bin.use_bin) {
            counts[index] += 1;
            total += 1;
        }
    }
    SimulatedHistogram { counts, total }
}

/// Negated chi-square over used bins. An empty simulation scores `-inf`.
pub fn chi_square(observed: &HistData, simulated: &SimulatedHistogram) -> MilkywayResult<f64> {
    if observed.bins.len() != simulated.counts.len() {
        return Err(MilkywayError::configuration(
            "CONFIG.HISTOGRAM",
            format!(
                "observed histogram has {} bins, simulation has {}",
                observed.bins.len(),
                simulated.counts.len()
            ),
        ));
    }
    if simulated.total == 0 {
        tracing::warn!("no simulated bodies fell in the histogram range");
        return Ok(f64::NEG_INFINITY);
    }

    let total = f64::from(simulated.total);
    let mut chisq = Kahan::ZERO;
    for (bin, count) in observed.bins.iter().zip(&simulated.counts) {
        if bin.use_bin {
            let difference = (bin.count - f64::from(*count) / total) / bin.err;
            chisq.add(difference * difference);
        }
    }
    Ok(-chisq.total())
}

/// Observed-format report of the simulated histogram.
pub fn write_histogram(
    sink: &mut dyn Write,
    params: &HistogramParams,
    angles: &HistogramAngles,
    shape: &HistogramShape,
    observed: &HistData,
    simulated: &SimulatedHistogram,
    chisq: f64,
) -> std::io::Result<()> {
    let total = f64::from(simulated.total);
    writeln!(sink, "#")?;
    writeln!(sink, "# Generated histogram")?;
    writeln!(sink, "# likelihood = {chisq:.15}")?;
    writeln!(
        sink,
        "# (phi, theta, psi) = ({:.6}, {:.6}, {:.6})",
        angles.phi_deg, angles.theta_deg, angles.psi_deg
    )?;
    writeln!(
        sink,
        "# lambda range = [{}, {}], bin size = {}, sun distance = {}",
        shape.start,
        shape.end(),
        shape.bin_size,
        params.sun_gc_dist_kpc
    )?;
    writeln!(sink, "# bodies binned = {}", simulated.total)?;
    writeln!(sink, "#")?;
    writeln!(sink)?;
    writeln!(sink, "<histogram>")?;
    for (index, (count, bin)) in simulated.counts.iter().zip(&observed.bins).enumerate() {
        let count = f64::from(*count);
        let err = if count == 0.0 {
            1.0 / total
        } else {
            count.sqrt() / total
        };
        writeln!(
            sink,
            "{} {:.10} {:.10} {:.10}",
            u8::from(bin.use_bin),
            shape.bin_center(index),
            count / total,
            err
        )?;
    }
    writeln!(sink, "</histogram>")
}

/// Result of scoring one simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct NbodyScore {
    pub chisq: f64,
    pub angles: HistogramAngles,
    pub shape: HistogramShape,
    pub observed: HistData,
    pub simulated: SimulatedHistogram,
}

/// Scores `bodies` against `observed`, binning with the angles of `params`.
/// A header in the observed file is informational only.
pub fn score_bodies(
    params: &HistogramParams,
    observed: HistData,
    bodies: &[Body],
) -> MilkywayResult<NbodyScore> {
    let shape = HistogramShape::from_params(params)?;
    let angles = HistogramAngles {
        phi_deg: params.phi_deg,
        theta_deg: params.theta_deg,
        psi_deg: params.psi_deg,
    };
    if let Some(header) = observed.angles.filter(|header| *header != angles) {
        tracing::debug!(
            header_phi = header.phi_deg,
            header_theta = header.theta_deg,
            header_psi = header.psi_deg,
            "histogram header angles differ from the parameters; using the parameters"
        );
    }
    let simulated = build_histogram(bodies, &shape, &angles, params.sun_gc_dist_kpc, &observed);
    let chisq = chi_square(&observed, &simulated)?;
    tracing::info!(
        chisq,
        binned = simulated.total,
        bodies = bodies.len(),
        "histogram scored"
    );
    Ok(NbodyScore {
        chisq,
        angles,
        shape,
        observed,
        simulated,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        HistBin, HistData, HistogramAngles, HistogramShape, SimulatedHistogram, chi_square,
        lambda_of, parse_hist_data,
    };
    use crate::nbody::config::HistogramParams;

    #[test]
    fn default_params_give_35_bins_from_minus_50() {
        let shape = HistogramShape::from_params(&HistogramParams::default()).expect("shape");
        assert_eq!(shape.max_idx, 35);
        // ceil(0 - 2.9 * 35 / 2) = ceil(-50.75)
        assert_eq!(shape.start, -50.0);
        assert_eq!(shape.bin_index(-50.0), Some(0));
        assert_eq!(shape.bin_index(-50.1), None);
        assert_eq!(shape.bin_index(51.4), Some(34));
        assert_eq!(shape.bin_index(51.6), None);
    }

    #[test]
    fn zero_bin_size_is_rejected() {
        let params = HistogramParams {
            bin_size: 0.0,
            ..HistogramParams::default()
        };
        assert!(HistogramShape::from_params(&params).is_err());
    }

    #[test]
    fn unrepresentable_bin_count_is_rejected() {
        let params = HistogramParams {
            bin_size: 1.0e-30,
            ..HistogramParams::default()
        };
        let error = HistogramShape::from_params(&params).expect_err("too many bins");
        assert_eq!(error.placeholder(), "CONFIG.HISTOGRAM_PARAMS");
    }

    #[test]
    fn expected_bin_count_does_not_drive_allocation() {
        let error = parse_hist_data("1 0 0.5 0.05\n", "hist", usize::MAX)
            .expect_err("one row for a huge histogram");
        assert_eq!(error.placeholder(), "CONFIG.HISTOGRAM");
    }

    #[test]
    fn parses_header_comments_and_rows() {
        let source = "# observed\n\
                      phi = 128.79 , theta = 54.39 , psi = 90.7\n\
                      \n\
                      1 -1.0 0.25 0.01\n\
                      0 1.0 0.75 0.02\n";
        let data = parse_hist_data(source, "hist", 2).expect("valid histogram");
        let angles = data.angles.expect("header");
        assert_eq!(angles.theta_deg, 54.39);
        assert_eq!(
            data.bins[1],
            HistBin {
                use_bin: false,
                lambda: 1.0,
                count: 0.75,
                err: 0.02,
            }
        );
    }

    #[test]
    fn bin_count_must_match_exactly() {
        let error = parse_hist_data("1 0 0.5 0.05\n", "hist", 2).expect_err("short");
        assert!(error.message().contains("has 1 bins, expected 2"));
    }

    #[test]
    fn malformed_row_is_rejected() {
        let error = parse_hist_data("1 0 half 0.05\n", "hist", 1).expect_err("bad row");
        assert!(error.message().starts_with("hist:1:"));
    }

    #[test]
    fn unused_bins_do_not_contribute() {
        let observed = HistData {
            angles: None,
            bins: vec![
                HistBin {
                    use_bin: true,
                    lambda: 0.0,
                    count: 0.5,
                    err: 0.1,
                },
                HistBin {
                    use_bin: false,
                    lambda: 1.0,
                    count: 0.5,
                    err: 0.1,
                },
            ],
        };
        let simulated = SimulatedHistogram {
            counts: vec![3, 0],
            total: 6,
        };
        let chisq = chi_square(&observed, &simulated).expect("score");
        assert!(chisq.abs() <= 1.0e-12);
    }

    #[test]
    fn lambda_rotation_identity_returns_longitude() {
        let angles = HistogramAngles {
            phi_deg: 0.0,
            theta_deg: 0.0,
            psi_deg: 0.0,
        };
        // a body 8 kpc from the sun towards l = 90 in the plane
        let lambda = lambda_of([-8.0, 8.0, 0.0], &angles, 8.0);
        assert!((lambda - 90.0).abs() <= 1.0e-12);
    }
}
