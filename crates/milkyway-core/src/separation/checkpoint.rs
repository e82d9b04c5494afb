//! Binary checkpoint of an [`EvaluationState`].
//!
//! Layout, native byte order, no padding:
//!
//! ```text
//! "separation_checkpoint\0"
//! current_integral: u32, nu_step: u32, mu_step: u32
//! sum: f64, correction: f64
//! per integral:
//!     background_integral: f64
//!     stream_integrals: f64 * number_streams
//!     probs: (sum: f64, correction: f64) * number_streams
//! "end_checkpoint\0"
//! ```
//!
//! Stream and integral counts are not stored; the reader takes them from the
//! run configuration.

use crate::domain::{MilkywayError, MilkywayErrorCategory, MilkywayResult};
use crate::numerics::Kahan;
use crate::separation::parameters::IntegralArea;
use crate::separation::state::{EvaluationState, Integral};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const CHECKPOINT_HEADER: &[u8] = b"separation_checkpoint\0";
pub const CHECKPOINT_TAIL: &[u8] = b"end_checkpoint\0";

pub fn checkpoint_len(number_integrals: usize, number_streams: usize) -> usize {
    let per_integral = 8 + number_streams * 8 + number_streams * 16;
    CHECKPOINT_HEADER.len() + 3 * 4 + 16 + number_integrals * per_integral + CHECKPOINT_TAIL.len()
}

pub fn encode_checkpoint(state: &EvaluationState) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(checkpoint_len(
        state.number_integrals(),
        state.number_streams(),
    ));
    bytes.extend_from_slice(CHECKPOINT_HEADER);
    bytes.extend_from_slice(&state.current_integral().to_ne_bytes());
    bytes.extend_from_slice(&state.nu_step().to_ne_bytes());
    bytes.extend_from_slice(&state.mu_step().to_ne_bytes());
    push_kahan(&mut bytes, state.sum());
    for integral in state.integrals() {
        bytes.extend_from_slice(&integral.background_integral.to_ne_bytes());
        for value in &integral.stream_integrals {
            bytes.extend_from_slice(&value.to_ne_bytes());
        }
        for probs in &integral.probs {
            push_kahan(&mut bytes, probs);
        }
    }
    bytes.extend_from_slice(CHECKPOINT_TAIL);
    bytes
}

fn push_kahan(bytes: &mut Vec<u8>, value: &Kahan) {
    bytes.extend_from_slice(&value.sum().to_ne_bytes());
    bytes.extend_from_slice(&value.correction().to_ne_bytes());
}

struct CheckpointReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> CheckpointReader<'a> {
    fn take(&mut self, len: usize, what: &str) -> MilkywayResult<&'a [u8]> {
        let end = self.offset + len;
        let slice = self.bytes.get(self.offset..end).ok_or_else(|| {
            MilkywayError::checksum(
                "CHECKPOINT.TRUNCATED",
                format!("checkpoint ended at byte {} while reading {what}", self.bytes.len()),
            )
        })?;
        self.offset = end;
        Ok(slice)
    }

    fn magic(&mut self, expected: &[u8], what: &str) -> MilkywayResult<()> {
        if self.take(expected.len(), what)? != expected {
            return Err(MilkywayError::checksum(
                "CHECKPOINT.MAGIC",
                format!("checkpoint {what} magic mismatch"),
            ));
        }
        Ok(())
    }

    fn u32(&mut self, what: &str) -> MilkywayResult<u32> {
        let mut raw = [0_u8; 4];
        raw.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_ne_bytes(raw))
    }

    fn f64(&mut self, what: &str) -> MilkywayResult<f64> {
        let mut raw = [0_u8; 8];
        raw.copy_from_slice(self.take(8, what)?);
        Ok(f64::from_ne_bytes(raw))
    }

    fn kahan(&mut self, what: &str) -> MilkywayResult<Kahan> {
        let sum = self.f64(what)?;
        let correction = self.f64(what)?;
        Ok(Kahan::from_parts(sum, correction))
    }
}

/// Parses a checkpoint written for `number_integrals` areas and
/// `number_streams` streams. Any structural problem is a checksum failure.
pub fn decode_checkpoint(
    bytes: &[u8],
    number_integrals: usize,
    number_streams: usize,
) -> MilkywayResult<EvaluationState> {
    let mut reader = CheckpointReader { bytes, offset: 0 };
    reader.magic(CHECKPOINT_HEADER, "header")?;
    let current_integral = reader.u32("current_integral")?;
    let nu_step = reader.u32("nu_step")?;
    let mu_step = reader.u32("mu_step")?;
    let sum = reader.kahan("sum")?;

    let mut integrals = Vec::with_capacity(number_integrals);
    for _ in 0..number_integrals {
        let mut integral = Integral::new(number_streams);
        integral.background_integral = reader.f64("background_integral")?;
        for value in &mut integral.stream_integrals {
            *value = reader.f64("stream_integrals")?;
        }
        for probs in &mut integral.probs {
            *probs = reader.kahan("probs")?;
        }
        integrals.push(integral);
    }

    reader.magic(CHECKPOINT_TAIL, "tail")?;
    if reader.offset != bytes.len() {
        return Err(MilkywayError::checksum(
            "CHECKPOINT.TRAILING",
            format!(
                "{} unexpected bytes after checkpoint tail",
                bytes.len() - reader.offset
            ),
        ));
    }

    Ok(EvaluationState::from_parts(
        (current_integral, nu_step, mu_step),
        sum,
        integrals,
        number_streams,
    ))
}

/// The checkpoint file of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes `state` next to the checkpoint and renames it into place, so a
    /// reader only ever sees the previous or the new checkpoint.
    pub fn write(&self, state: &EvaluationState) -> MilkywayResult<()> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temporary = NamedTempFile::new_in(directory).map_err(|source| {
            MilkywayError::io_system(
                "IO.CHECKPOINT_WRITE",
                format!(
                    "failed to create temporary checkpoint in '{}': {}",
                    directory.display(),
                    source
                ),
            )
        })?;
        temporary
            .write_all(&encode_checkpoint(state))
            .and_then(|()| temporary.as_file().sync_all())
            .map_err(|source| {
                MilkywayError::io_system(
                    "IO.CHECKPOINT_WRITE",
                    format!(
                        "failed to write temporary checkpoint '{}': {}",
                        temporary.path().display(),
                        source
                    ),
                )
            })?;
        temporary.persist(&self.path).map_err(|error| {
            MilkywayError::io_system(
                "IO.CHECKPOINT_WRITE",
                format!(
                    "failed to move checkpoint into place at '{}': {}",
                    self.path.display(),
                    error.error
                ),
            )
        })?;

        tracing::debug!(
            path = %self.path.display(),
            integral = state.current_integral(),
            nu_step = state.nu_step(),
            mu_step = state.mu_step(),
            "checkpoint written"
        );
        Ok(())
    }

    pub fn read(
        &self,
        number_integrals: usize,
        number_streams: usize,
    ) -> MilkywayResult<EvaluationState> {
        let bytes = fs::read(&self.path).map_err(|source| {
            MilkywayError::io_system(
                "IO.CHECKPOINT_READ",
                format!("failed to read checkpoint '{}': {}", self.path.display(), source),
            )
        })?;
        decode_checkpoint(&bytes, number_integrals, number_streams)
    }

    /// Removes the checkpoint; a missing file is not an error.
    pub fn remove(&self) -> MilkywayResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MilkywayError::io_system(
                "IO.CHECKPOINT_REMOVE",
                format!("failed to remove checkpoint '{}': {}", self.path.display(), source),
            )),
        }
    }

    /// Resumes from the checkpoint if one exists and matches `areas`,
    /// otherwise starts fresh. A corrupt or foreign checkpoint is deleted.
    pub fn maybe_resume(
        &self,
        areas: &[IntegralArea],
        number_streams: usize,
    ) -> MilkywayResult<EvaluationState> {
        if !self.exists() {
            return Ok(EvaluationState::new(areas.len(), number_streams));
        }

        let resumed = self
            .read(areas.len(), number_streams)
            .and_then(|state| state.validate_against(areas).map(|()| state));
        match resumed {
            Ok(state) => {
                tracing::info!(
                    path = %self.path.display(),
                    integral = state.current_integral(),
                    nu_step = state.nu_step(),
                    mu_step = state.mu_step(),
                    "resuming from checkpoint"
                );
                Ok(state)
            }
            Err(error) if error.category() == MilkywayErrorCategory::ChecksumFailure => {
                tracing::warn!(
                    path = %self.path.display(),
                    "{}; discarding checkpoint and starting fresh",
                    error.diagnostic_line()
                );
                self.remove()?;
                Ok(EvaluationState::new(areas.len(), number_streams))
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CHECKPOINT_HEADER, checkpoint_len, decode_checkpoint, encode_checkpoint};
    use crate::domain::MilkywayErrorCategory;
    use crate::separation::parameters::{AxisBounds, IntegralArea};
    use crate::separation::state::{EvaluationPhase, EvaluationState};

    fn sample_state() -> EvaluationState {
        let area = IntegralArea::from_bounds(
            AxisBounds::new(0.0, 1.0, 3),
            AxisBounds::new(0.0, 1.0, 2),
            AxisBounds::new(16.0, 17.0, 1),
        )
        .expect("valid area");
        let mut state = EvaluationState::new(2, 2);
        for (index, value) in [0.1, 1.0e-17, 3.7, 0.3].into_iter().enumerate() {
            state.add_bin(value, &[value * 2.0, -value]).expect("in range");
            state.advance(&area);
            assert_eq!(state.completed_bins(&[area, area]), index as u64 + 1);
        }
        state
    }

    #[test]
    fn encoded_length_matches_layout() {
        let state = sample_state();
        let bytes = encode_checkpoint(&state);
        assert_eq!(bytes.len(), checkpoint_len(2, 2));
        assert_eq!(bytes.len(), 22 + 12 + 16 + 2 * (8 + 16 + 32) + 15);
        assert!(bytes.starts_with(CHECKPOINT_HEADER));
        assert!(bytes.ends_with(b"end_checkpoint\0"));
    }

    #[test]
    fn decode_restores_every_field() {
        let state = sample_state();
        let restored = decode_checkpoint(&encode_checkpoint(&state), 2, 2).expect("decodes");
        assert_eq!(restored.phase(), EvaluationPhase::Resumed);
        assert_eq!(restored.current_integral(), state.current_integral());
        assert_eq!(restored.nu_step(), state.nu_step());
        assert_eq!(restored.mu_step(), state.mu_step());
        assert_eq!(restored.sum().sum().to_bits(), state.sum().sum().to_bits());
        assert_eq!(
            restored.sum().correction().to_bits(),
            state.sum().correction().to_bits()
        );
        assert_eq!(restored.integrals(), state.integrals());
    }

    #[test]
    fn structural_damage_is_a_checksum_failure() {
        let bytes = encode_checkpoint(&sample_state());

        let mut bad_header = bytes.clone();
        bad_header[0] = b'S';
        let mut bad_tail = bytes.clone();
        let last = bad_tail.len() - 2;
        bad_tail[last] = b'x';
        let mut trailing = bytes.clone();
        trailing.push(0);
        let truncated = &bytes[..bytes.len() - 20];

        for (label, damaged) in [
            ("header", bad_header.as_slice()),
            ("tail", bad_tail.as_slice()),
            ("trailing", trailing.as_slice()),
            ("truncated", truncated),
            ("empty", &[][..]),
        ] {
            let error = decode_checkpoint(damaged, 2, 2).expect_err(label);
            assert_eq!(error.category(), MilkywayErrorCategory::ChecksumFailure, "{label}");
        }
    }

    #[test]
    fn reading_with_more_streams_than_written_fails() {
        let bytes = encode_checkpoint(&sample_state());
        let error = decode_checkpoint(&bytes, 2, 3).expect_err("shape mismatch");
        assert_eq!(error.category(), MilkywayErrorCategory::ChecksumFailure);
    }
}
