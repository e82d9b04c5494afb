use crate::domain::{MilkywayError, MilkywayResult};
use crate::separation::parameters::{
    AstronomyParameters, AxisBounds, BackgroundParameters, IntegralArea, StreamParameters, Streams,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct IntegralAreaConfig {
    pub mu: AxisBounds,
    pub nu: AxisBounds,
    pub r: AxisBounds,
}

/// Parameter document of a separation run.
///
/// ```json
/// {
///   "wedge": 82,
///   "convolve": 120,
///   "background": { "alpha": 1.0, "q": 0.6, "r0": 12.0, "delta": 1.0 },
///   "streams": [
///     { "mu": 180.0, "r": 22.0, "theta": 1.5, "phi": 0.2, "sigma": 2.5, "epsilon": -1.0 }
///   ],
///   "integrals": [
///     { "mu": { "min": 310.0, "max": 419.0, "steps": 1600 },
///       "nu": { "min": -1.25, "max": 1.25, "steps": 640 },
///       "r":  { "min": 16.0, "max": 22.5, "steps": 700 } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeparationConfig {
    pub wedge: i32,
    pub convolve: u32,
    pub background: BackgroundParameters,
    #[serde(default)]
    pub streams: Vec<StreamParameters>,
    pub integrals: Vec<IntegralAreaConfig>,
}

/// Validated inputs of one separation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationSetup {
    pub astronomy: AstronomyParameters,
    pub streams: Streams,
    pub areas: Vec<IntegralArea>,
}

impl SeparationConfig {
    pub fn from_json_str(source: &str, origin: &str) -> MilkywayResult<Self> {
        serde_json::from_str(source).map_err(|error| {
            MilkywayError::configuration(
                "CONFIG.PARAMETERS",
                format!("failed to parse separation parameters '{origin}': {error}"),
            )
        })
    }

    pub fn load(path: &Path) -> MilkywayResult<Self> {
        let source = fs::read_to_string(path).map_err(|source| {
            MilkywayError::io_system(
                "IO.PARAMETERS",
                format!("failed to read parameter file '{}': {}", path.display(), source),
            )
        })?;
        Self::from_json_str(&source, &path.display().to_string())
    }

    pub fn build(&self) -> MilkywayResult<SeparationSetup> {
        let astronomy = AstronomyParameters::new(
            &self.background,
            self.wedge,
            self.convolve,
            self.streams.len(),
            self.integrals.len(),
        )?;
        let streams = Streams::new(self.streams.clone(), &astronomy)?;
        let areas = self
            .integrals
            .iter()
            .enumerate()
            .map(|(index, area)| {
                IntegralArea::from_bounds(area.mu, area.nu, area.r).map_err(|error| {
                    MilkywayError::configuration(
                        "CONFIG.INTEGRAL_AREA",
                        format!("integral {index}: {}", error.message()),
                    )
                })
            })
            .collect::<MilkywayResult<Vec<_>>>()?;

        Ok(SeparationSetup {
            astronomy,
            streams,
            areas,
        })
    }
}
