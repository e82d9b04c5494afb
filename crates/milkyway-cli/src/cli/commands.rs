use super::CliError;
use super::helpers::{finish_output, open_output, write_json};
use milkyway_core::domain::{ComputeProgram, MilkywayError};
use milkyway_core::nbody::{HistogramParams, nbody_chisq, write_histogram};
use milkyway_core::separation::{
    CheckpointPolicy, CheckpointStore, EvaluationOutcome, SeparationConfig, evaluate,
    read_star_points,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(clap::Args)]
pub(super) struct SeparationArgs {
    /// Separation parameter document (JSON)
    #[arg(long, short = 'p')]
    params: PathBuf,

    /// Star points file: a count line, then `l b r` per star
    #[arg(long, short = 's')]
    stars: PathBuf,

    /// Checkpoint file; without it the run is not checkpointed
    #[arg(long, short = 'c')]
    checkpoint: Option<PathBuf>,

    /// Start fresh even if the checkpoint exists
    #[arg(long, requires = "checkpoint")]
    ignore_checkpoint: bool,

    /// Delete the checkpoint after a completed run
    #[arg(long, requires = "checkpoint")]
    cleanup_checkpoint: bool,

    /// Seconds between checkpoint writes
    #[arg(long, default_value_t = 60)]
    checkpoint_interval: u64,

    /// Integrate at most this many bins, then checkpoint and stop
    #[arg(long, requires = "checkpoint")]
    max_bins: Option<u64>,

    /// Results file (default: stdout)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Write results as JSON instead of the tagged text report
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
pub(super) struct NbodyArgs {
    /// Observed histogram file
    #[arg(long)]
    histogram: PathBuf,

    /// Simulated bodies file: `ignore x y z` per body
    #[arg(long, short = 'b')]
    bodies: PathBuf,

    /// Histogram parameter document (JSON); defaults apply when omitted
    #[arg(long, short = 'p')]
    params: Option<PathBuf>,

    /// Also write the simulated histogram to this file
    #[arg(long)]
    histout: Option<PathBuf>,

    /// Likelihood output file (default: stdout)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Write the score as JSON
    #[arg(long)]
    json: bool,
}

impl SeparationArgs {
    fn checkpoint_policy(&self) -> Option<CheckpointPolicy> {
        let path = self.checkpoint.clone()?;
        let mut policy = CheckpointPolicy::new(
            CheckpointStore::new(path),
            Duration::from_secs(self.checkpoint_interval),
        );
        policy.ignore_existing = self.ignore_checkpoint;
        policy.cleanup_on_completion = self.cleanup_checkpoint;
        policy.bin_budget = self.max_bins;
        Some(policy)
    }
}

pub(super) fn run_separation_command(args: SeparationArgs) -> Result<i32, CliError> {
    tracing::info!(
        program = %ComputeProgram::Separation,
        params = %args.params.display(),
        "starting"
    );
    if args.max_bins == Some(0) {
        return Err(CliError::Usage("--max-bins must be at least 1".to_string()));
    }

    let setup = SeparationConfig::load(&args.params)?.build()?;
    let stars = read_star_points(&args.stars)?;
    let policy = args.checkpoint_policy();

    let outcome = evaluate(&setup, &stars, policy.as_ref())?;
    let mut sink = open_output(args.output.as_deref())?;
    match outcome {
        EvaluationOutcome::Completed(results) => {
            if args.json {
                write_json(sink.as_mut(), &results)?;
            } else {
                results.write_to(sink.as_mut()).map_err(|source| {
                    MilkywayError::io_system(
                        "IO.OUTPUT",
                        format!("failed to write separation results: {source}"),
                    )
                })?;
            }
        }
        EvaluationOutcome::Interrupted {
            completed_bins,
            total_bins,
        } => {
            let checkpoint = policy
                .as_ref()
                .map(|policy| policy.store.path().display().to_string())
                .unwrap_or_default();
            if args.json {
                write_json(
                    sink.as_mut(),
                    &serde_json::json!({
                        "interrupted": true,
                        "completedBins": completed_bins,
                        "totalBins": total_bins,
                        "checkpoint": checkpoint,
                    }),
                )?;
            } else {
                writeln!(
                    sink,
                    "interrupted after {completed_bins}/{total_bins} bins; \
                     checkpoint '{checkpoint}'"
                )
                .map_err(|source| {
                    MilkywayError::io_system(
                        "IO.OUTPUT",
                        format!("failed to write interruption notice: {source}"),
                    )
                })?;
            }
        }
    }
    finish_output(sink, args.output.as_deref())?;
    Ok(0)
}

pub(super) fn run_nbody_command(args: NbodyArgs) -> Result<i32, CliError> {
    tracing::info!(
        program = %ComputeProgram::NbodyChisq,
        histogram = %args.histogram.display(),
        "starting"
    );
    let params = match &args.params {
        Some(path) => HistogramParams::load(path)?,
        None => HistogramParams::default(),
    };

    let score = nbody_chisq(&params, &args.histogram, &args.bodies)?;

    if let Some(path) = &args.histout {
        let mut histogram_sink = open_output(Some(path.as_path()))?;
        write_histogram(
            histogram_sink.as_mut(),
            &params,
            &score.angles,
            &score.shape,
            &score.observed,
            &score.simulated,
            score.chisq,
        )
        .map_err(|source| {
            MilkywayError::io_system(
                "IO.HISTOGRAM_OUT",
                format!("failed to write histogram '{}': {}", path.display(), source),
            )
        })?;
        finish_output(histogram_sink, Some(path.as_path()))?;
    }

    let mut sink = open_output(args.output.as_deref())?;
    if args.json {
        write_json(
            sink.as_mut(),
            &serde_json::json!({
                "chisq": score.chisq.is_finite().then_some(score.chisq),
                "degenerate": !score.chisq.is_finite(),
                "binnedBodies": score.simulated.total,
                "bins": score.shape.max_idx,
            }),
        )?;
    } else {
        writeln!(sink, "<search_likelihood> {:.15} </search_likelihood>", score.chisq).map_err(
            |source| {
                MilkywayError::io_system(
                    "IO.OUTPUT",
                    format!("failed to write likelihood: {source}"),
                )
            },
        )?;
    }
    finish_output(sink, args.output.as_deref())?;
    Ok(0)
}
