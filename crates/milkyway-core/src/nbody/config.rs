use crate::common::constants::NBODY_SUN_GC_DIST_KPC;
use crate::domain::{MilkywayError, MilkywayResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Orientation and binning of the observed lambda histogram.
///
/// Every field is optional in the JSON document; missing fields keep the
/// historical defaults.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct HistogramParams {
    #[serde(rename = "phi")]
    pub phi_deg: f64,
    #[serde(rename = "theta")]
    pub theta_deg: f64,
    #[serde(rename = "psi")]
    pub psi_deg: f64,
    pub start_raw: f64,
    pub end_raw: f64,
    pub center: f64,
    pub bin_size: f64,
    #[serde(rename = "sunGCDist")]
    pub sun_gc_dist_kpc: f64,
}

impl Default for HistogramParams {
    fn default() -> Self {
        Self {
            phi_deg: 128.79,
            theta_deg: 54.39,
            psi_deg: 90.70,
            start_raw: -50.0,
            end_raw: 50.0,
            center: 0.0,
            bin_size: 2.9,
            sun_gc_dist_kpc: NBODY_SUN_GC_DIST_KPC,
        }
    }
}

impl HistogramParams {
    pub fn from_json_str(source: &str, origin: &str) -> MilkywayResult<Self> {
        serde_json::from_str(source).map_err(|error| {
            MilkywayError::configuration(
                "CONFIG.HISTOGRAM_PARAMS",
                format!("failed to parse histogram parameters '{origin}': {error}"),
            )
        })
    }

    pub fn load(path: &Path) -> MilkywayResult<Self> {
        let source = fs::read_to_string(path).map_err(|source| {
            MilkywayError::io_system(
                "IO.HISTOGRAM_PARAMS",
                format!(
                    "failed to read histogram parameters '{}': {}",
                    path.display(),
                    source
                ),
            )
        })?;
        Self::from_json_str(&source, &path.display().to_string())
    }
}
