use crate::domain::{MilkywayError, MilkywayResult};
use crate::numerics::Vector3;
use std::fs;
use std::path::Path;

/// Final position of one simulated body in galactocentric kpc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    /// Bodies of ignored model components are never binned.
    pub ignore: bool,
    pub position: Vector3,
}

pub fn read_bodies(path: &Path) -> MilkywayResult<Vec<Body>> {
    let source = fs::read_to_string(path).map_err(|source| {
        MilkywayError::io_system(
            "IO.BODIES",
            format!("failed to read body file '{}': {}", path.display(), source),
        )
    })?;
    parse_bodies(&source, &path.display().to_string())
}

/// Parses `ignore x y z` rows; `#` comments and blank lines are skipped.
pub fn parse_bodies(source: &str, origin: &str) -> MilkywayResult<Vec<Body>> {
    let mut bodies = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let malformed = || {
            MilkywayError::configuration(
                "CONFIG.BODIES",
                format!("{origin}:{}: expected '<ignore> x y z', found '{line}'", index + 1),
            )
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [ignore, x, y, z] = fields.as_slice() else {
            return Err(malformed());
        };
        let ignore = match *ignore {
            "0" => false,
            "1" => true,
            _ => return Err(malformed()),
        };
        let mut position = [0.0; 3];
        for (slot, text) in position.iter_mut().zip([x, y, z]) {
            *slot = text
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(malformed)?;
        }
        bodies.push(Body { ignore, position });
    }
    Ok(bodies)
}
