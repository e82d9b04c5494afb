pub mod errors;

pub use errors::{ExitMapping, MilkywayError, MilkywayErrorCategory, MilkywayResult};

use std::fmt::{Display, Formatter};

/// The two programs built on the shared evaluation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeProgram {
    Separation,
    NbodyChisq,
}

impl ComputeProgram {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Separation => "SEPARATION",
            Self::NbodyChisq => "NBODY_CHISQ",
        }
    }
}

impl Display for ComputeProgram {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ComputeProgram;

    #[test]
    fn program_labels_are_stable() {
        assert_eq!(ComputeProgram::Separation.to_string(), "SEPARATION");
        assert_eq!(ComputeProgram::NbodyChisq.to_string(), "NBODY_CHISQ");
    }
}
