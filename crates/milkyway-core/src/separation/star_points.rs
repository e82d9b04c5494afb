use crate::domain::{MilkywayError, MilkywayResult};
use std::fs;
use std::path::Path;

/// One survey star: galactic longitude and latitude, heliocentric distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarPoint {
    pub l_deg: f64,
    pub b_deg: f64,
    pub r_kpc: f64,
}

pub fn read_star_points(path: &Path) -> MilkywayResult<Vec<StarPoint>> {
    let source = fs::read_to_string(path).map_err(|source| {
        MilkywayError::io_system(
            "IO.STAR_POINTS",
            format!("failed to read star file '{}': {}", path.display(), source),
        )
    })?;
    parse_star_points(&source, &path.display().to_string())
}

/// Parses `count` followed by `count` lines of `l b r`. Blank lines are
/// ignored.
pub fn parse_star_points(source: &str, origin: &str) -> MilkywayResult<Vec<StarPoint>> {
    let mut lines = source
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (count_line, count_text) = lines.next().ok_or_else(|| {
        MilkywayError::configuration(
            "CONFIG.STAR_POINTS",
            format!("star file '{origin}' is empty"),
        )
    })?;
    let expected: usize = count_text.parse().map_err(|_| {
        MilkywayError::configuration(
            "CONFIG.STAR_POINTS",
            format!("{origin}:{count_line}: expected a star count, found '{count_text}'"),
        )
    })?;
    if expected == 0 {
        return Err(MilkywayError::configuration(
            "CONFIG.STAR_POINTS",
            format!("star file '{origin}' declares no stars"),
        ));
    }

    // the declared count is untrusted; never reserve past the listed rows
    let mut stars = Vec::with_capacity(expected.min(source.lines().count()));
    for (line_number, line) in lines {
        let values = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .ok()
            .filter(|values| values.len() == 3 && values.iter().all(|value| value.is_finite()))
            .ok_or_else(|| {
                MilkywayError::configuration(
                    "CONFIG.STAR_POINTS",
                    format!("{origin}:{line_number}: expected 'l b r', found '{line}'"),
                )
            })?;
        stars.push(StarPoint {
            l_deg: values[0],
            b_deg: values[1],
            r_kpc: values[2],
        });
    }

    if stars.len() != expected {
        return Err(MilkywayError::configuration(
            "CONFIG.STAR_POINTS",
            format!(
                "star file '{origin}' declares {expected} stars but lists {}",
                stars.len()
            ),
        ));
    }
    Ok(stars)
}
