use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const PARAMETERS: &str = r#"{
    "wedge": 82,
    "convolve": 8,
    "background": { "alpha": 0.9, "q": 0.65, "r0": 11.0, "delta": 1.2 },
    "streams": [
        { "mu": 202.0, "r": 18.0, "theta": 1.3, "phi": 0.4, "sigma": 2.5, "epsilon": -1.5 }
    ],
    "integrals": [
        { "mu": { "min": 200.0, "max": 206.0, "steps": 4 },
          "nu": { "min": -1.5, "max": 1.5, "steps": 3 },
          "r":  { "min": 17.0, "max": 21.0, "steps": 5 } }
    ]
}"#;

const STARS: &str = "2\n160.0 55.0 12.0\n162.5 56.0 20.5\n";

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dir should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_milkyway-rs"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("binary should run")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp paths are utf-8")
}

struct SeparationFixture {
    _temp: TempDir,
    params: PathBuf,
    stars: PathBuf,
    checkpoint: PathBuf,
}

impl SeparationFixture {
    fn new(parameters: &str) -> Self {
        let temp = TempDir::new().expect("tempdir should be created");
        let params = temp.path().join("params.json");
        let stars = temp.path().join("stars.txt");
        let checkpoint = temp.path().join("state/separation_checkpoint");
        write_file(&params, parameters);
        write_file(&stars, STARS);
        fs::create_dir_all(checkpoint.parent().expect("checkpoint has a parent"))
            .expect("checkpoint dir should be created");
        Self {
            _temp: temp,
            params,
            stars,
            checkpoint,
        }
    }

    fn run(&self, extra_args: &[&str]) -> Output {
        let mut args = vec![
            "separation",
            "--params",
            path_arg(&self.params),
            "--stars",
            path_arg(&self.stars),
        ];
        args.extend_from_slice(extra_args);
        run_cli(&args)
    }
}

#[test]
fn separation_prints_tagged_results() {
    let fixture = SeparationFixture::new(PARAMETERS);
    let output = fixture.run(&[]);

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    for tag in [
        "<background_integral>",
        "<stream_integral>",
        "<background_likelihood>",
        "<stream_only_likelihood>",
        "<search_likelihood>",
    ] {
        assert!(stdout.contains(tag), "stdout should contain {tag}: {stdout}");
    }
}

#[test]
fn separation_json_report_has_one_stream_integral() {
    let fixture = SeparationFixture::new(PARAMETERS);
    let output = fixture.run(&["--json"]);
    assert!(output.status.success());

    let parsed: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(
        parsed["stream_integrals"]
            .as_array()
            .expect("stream integrals array")
            .len(),
        1
    );
    assert!(parsed["likelihood"].as_f64().is_some_and(f64::is_finite));
}

#[test]
fn odd_convolve_is_a_configuration_failure() {
    let fixture = SeparationFixture::new(&PARAMETERS.replace("\"convolve\": 8", "\"convolve\": 7"));
    let output = fixture.run(&[]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [CONFIG.CONVOLVE]"), "stderr: {stderr}");
    assert!(stderr.contains("FATAL EXIT CODE: 2"), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn bin_budget_then_resume_matches_uninterrupted_output() {
    let fixture = SeparationFixture::new(PARAMETERS);
    let reference = fixture.run(&[]);
    assert!(reference.status.success());

    let checkpoint = path_arg(&fixture.checkpoint);
    let first = fixture.run(&["--checkpoint", checkpoint, "--max-bins", "5"]);
    assert!(first.status.success());
    assert!(
        String::from_utf8_lossy(&first.stdout).contains("interrupted after 5/12 bins"),
        "stdout: {}",
        String::from_utf8_lossy(&first.stdout)
    );
    assert!(fixture.checkpoint.exists());

    let resumed = fixture.run(&["--checkpoint", checkpoint, "--cleanup-checkpoint"]);
    assert!(
        resumed.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&resumed.stderr)
    );
    assert_eq!(resumed.stdout, reference.stdout);
    assert!(!fixture.checkpoint.exists(), "checkpoint should be cleaned up");
}

#[test]
fn zero_bin_budget_is_a_usage_error() {
    let fixture = SeparationFixture::new(PARAMETERS);
    let checkpoint = path_arg(&fixture.checkpoint);
    let output = fixture.run(&["--checkpoint", checkpoint, "--max-bins", "0"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("CONFIG.CLI_USAGE"));
}

#[test]
fn missing_star_file_exits_with_io_code() {
    let fixture = SeparationFixture::new(PARAMETERS);
    fs::remove_file(&fixture.stars).expect("stars should be removed");
    let output = fixture.run(&[]);

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[IO.STAR_POINTS]"));
}

#[test]
fn nbody_chisq_prints_search_likelihood() {
    let temp = TempDir::new().expect("tempdir should be created");
    let params = temp.path().join("histogram.json");
    let histogram = temp.path().join("observed.hist");
    let bodies = temp.path().join("bodies.txt");
    let histout = temp.path().join("out/simulated.hist");
    write_file(
        &params,
        r#"{ "phi": 0.0, "theta": 0.0, "psi": 0.0,
             "startRaw": -1.45, "endRaw": 1.45, "center": 0.0, "binSize": 2.9 }"#,
    );
    write_file(&histogram, "phi = 0 , theta = 0 , psi = 0\n1 0.0 0.5 0.05\n");
    write_file(&bodies, &"0 0.0 0.05 0.0\n".repeat(100));

    let output = run_cli(&[
        "nbody-chisq",
        "--histogram",
        path_arg(&histogram),
        "--bodies",
        path_arg(&bodies),
        "--params",
        path_arg(&params),
        "--histout",
        path_arg(&histout),
    ]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: f64 = stdout
        .trim()
        .strip_prefix("<search_likelihood>")
        .and_then(|rest| rest.strip_suffix("</search_likelihood>"))
        .expect("tagged likelihood")
        .trim()
        .parse()
        .expect("numeric likelihood");
    assert!((value + 100.0).abs() < 1.0e-9, "likelihood {value}");
    assert!(
        fs::read_to_string(&histout)
            .expect("histogram output")
            .contains("<histogram>")
    );
}

#[test]
fn nbody_chisq_json_marks_degenerate_scores() {
    let temp = TempDir::new().expect("tempdir should be created");
    let params = temp.path().join("histogram.json");
    let histogram = temp.path().join("observed.hist");
    let bodies = temp.path().join("bodies.txt");
    write_file(
        &params,
        r#"{ "phi": 0.0, "theta": 0.0, "psi": 0.0,
             "startRaw": -1.45, "endRaw": 1.45, "center": 0.0, "binSize": 2.9 }"#,
    );
    write_file(&histogram, "phi = 0 , theta = 0 , psi = 0\n1 0.0 0.5 0.05\n");
    write_file(&bodies, "0 -8.0 8.0 0.0\n");

    let output = run_cli(&[
        "nbody-chisq",
        "--histogram",
        path_arg(&histogram),
        "--bodies",
        path_arg(&bodies),
        "--params",
        path_arg(&params),
        "--json",
    ]);

    assert!(output.status.success());
    let parsed: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["degenerate"], Value::Bool(true));
    assert!(parsed["chisq"].is_null());
    assert_eq!(parsed["binnedBodies"], 0);
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let output = run_cli(&["integrate-everything"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("CONFIG.CLI_USAGE"));
}
