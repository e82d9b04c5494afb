use milkyway_core::domain::MilkywayErrorCategory;
use milkyway_core::nbody::{HistogramParams, nbody_chisq, write_histogram};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SINGLE_BIN_PARAMS: &str = r#"{
    "phi": 0.0, "theta": 0.0, "psi": 0.0,
    "startRaw": -1.45, "endRaw": 1.45, "center": 0.0, "binSize": 2.9,
    "sunGCDist": 8.0
}"#;

const SINGLE_BIN_HISTOGRAM: &str = "\
# observed stream density
phi = 0 , theta = 0 , psi = 0

1 0.0 0.5 0.05
";

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("fixture should be written");
    path
}

/// 100 bodies just off the Sun-centre line (l ~ 0.36 deg) plus ignored ones
/// that would otherwise land in the same bin.
fn bodies_near_center() -> String {
    let mut bodies = String::from("# ignore x y z\n");
    for _ in 0..100 {
        writeln!(bodies, "0 0.0 0.05 0.0").expect("string write");
    }
    for _ in 0..25 {
        writeln!(bodies, "1 0.0 0.05 0.0").expect("string write");
    }
    bodies
}

#[test]
fn single_bin_score_matches_hand_computed_chisq() {
    let temp = TempDir::new().expect("tempdir should be created");
    let params = HistogramParams::from_json_str(SINGLE_BIN_PARAMS, "params").expect("params");
    let histogram = write_file(temp.path(), "observed.hist", SINGLE_BIN_HISTOGRAM);
    let bodies = write_file(temp.path(), "bodies.txt", &bodies_near_center());

    let score = nbody_chisq(&params, &histogram, &bodies).expect("scoring should succeed");

    assert_eq!(score.shape.max_idx, 1);
    assert_eq!(score.shape.start, -1.0);
    assert_eq!(score.simulated.counts, vec![100]);
    assert_eq!(score.simulated.total, 100);
    // observed 0.5 vs simulated 1.0 with err 0.05
    assert!(
        (score.chisq + 100.0).abs() < 1.0e-9,
        "unexpected chisq {}",
        score.chisq
    );
}

#[test]
fn parameter_angles_win_over_histogram_header() {
    let temp = TempDir::new().expect("tempdir should be created");
    let params = HistogramParams::from_json_str(SINGLE_BIN_PARAMS, "params").expect("params");
    let histogram = write_file(
        temp.path(),
        "observed.hist",
        "phi = 128.79 , theta = 54.39 , psi = 90.70\n1 0.0 0.5 0.05\n",
    );
    let bodies = write_file(temp.path(), "bodies.txt", &bodies_near_center());

    let score = nbody_chisq(&params, &histogram, &bodies).expect("scoring should succeed");

    let header = score.observed.angles.expect("header is still parsed");
    assert_eq!(header.phi_deg, 128.79);
    assert_eq!(score.angles.phi_deg, 0.0);
    assert_eq!(score.angles.theta_deg, 0.0);
    assert_eq!(score.angles.psi_deg, 0.0);
    assert_eq!(score.simulated.total, 100);
    assert!(
        (score.chisq + 100.0).abs() < 1.0e-9,
        "unexpected chisq {}",
        score.chisq
    );
}

#[test]
fn bodies_outside_the_histogram_score_negative_infinity() {
    let temp = TempDir::new().expect("tempdir should be created");
    let params = HistogramParams::from_json_str(SINGLE_BIN_PARAMS, "params").expect("params");
    let histogram = write_file(temp.path(), "observed.hist", SINGLE_BIN_HISTOGRAM);
    // l = 90 deg from the Sun, far outside [-1, 1.9)
    let bodies = write_file(temp.path(), "bodies.txt", "0 -8.0 8.0 0.0\n0 -8.0 8.0 1.0\n");

    let score = nbody_chisq(&params, &histogram, &bodies).expect("scoring should succeed");
    assert_eq!(score.simulated.total, 0);
    assert_eq!(score.chisq, f64::NEG_INFINITY);
}

#[test]
fn histogram_with_wrong_bin_count_is_rejected() {
    let temp = TempDir::new().expect("tempdir should be created");
    let params = HistogramParams::from_json_str(SINGLE_BIN_PARAMS, "params").expect("params");
    let histogram = write_file(temp.path(), "observed.hist", "1 0.0 0.5 0.05\n1 2.9 0.5 0.05\n");
    let bodies = write_file(temp.path(), "bodies.txt", &bodies_near_center());

    let error = nbody_chisq(&params, &histogram, &bodies).expect_err("two rows for one bin");
    assert_eq!(error.category(), MilkywayErrorCategory::ConfigurationError);
    assert_eq!(error.placeholder(), "CONFIG.HISTOGRAM");
}

#[test]
fn missing_bodies_file_is_an_io_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let params = HistogramParams::from_json_str(SINGLE_BIN_PARAMS, "params").expect("params");
    let histogram = write_file(temp.path(), "observed.hist", SINGLE_BIN_HISTOGRAM);

    let error = nbody_chisq(&params, &histogram, &temp.path().join("absent.txt"))
        .expect_err("bodies file is missing");
    assert_eq!(error.category(), MilkywayErrorCategory::IoSystemError);
    assert_eq!(error.exit_code(), 3);
}

#[test]
fn simulated_histogram_report_lists_normalized_counts() {
    let temp = TempDir::new().expect("tempdir should be created");
    let params = HistogramParams::from_json_str(SINGLE_BIN_PARAMS, "params").expect("params");
    let histogram = write_file(temp.path(), "observed.hist", SINGLE_BIN_HISTOGRAM);
    let bodies = write_file(temp.path(), "bodies.txt", &bodies_near_center());
    let score = nbody_chisq(&params, &histogram, &bodies).expect("scoring should succeed");

    let mut report = Vec::new();
    write_histogram(
        &mut report,
        &params,
        &score.angles,
        &score.shape,
        &score.observed,
        &score.simulated,
        score.chisq,
    )
    .expect("report should be written");
    let report = String::from_utf8(report).expect("utf-8 report");

    assert!(report.contains("# bodies binned = 100"));
    assert!(report.contains(
        "<histogram>\n1 0.4500000000 1.0000000000 0.1000000000\n</histogram>"
    ));
}
