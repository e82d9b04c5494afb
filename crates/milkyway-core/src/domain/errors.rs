use std::error::Error;
use std::fmt::{Display, Formatter};

pub type MilkywayResult<T> = Result<T, MilkywayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MilkywayErrorCategory {
    Success,
    ConfigurationError,
    IoSystemError,
    NumericDegeneracy,
    ChecksumFailure,
    InternalError,
}

impl MilkywayErrorCategory {
    pub const fn exit_mapping(self) -> ExitMapping {
        match self {
            Self::Success => ExitMapping {
                exit_code: 0,
                rust_category: "Success",
                diagnostic_class: "SUCCESS",
            },
            Self::ConfigurationError => ExitMapping {
                exit_code: 2,
                rust_category: "ConfigurationError",
                diagnostic_class: "CONFIG_FATAL",
            },
            Self::IoSystemError => ExitMapping {
                exit_code: 3,
                rust_category: "IoSystemError",
                diagnostic_class: "IO_FATAL",
            },
            Self::NumericDegeneracy => ExitMapping {
                exit_code: 4,
                rust_category: "NumericDegeneracy",
                diagnostic_class: "NUMERIC_FATAL",
            },
            Self::ChecksumFailure => ExitMapping {
                exit_code: 5,
                rust_category: "ChecksumFailure",
                diagnostic_class: "CHECKPOINT_RECOVERED",
            },
            Self::InternalError => ExitMapping {
                exit_code: 6,
                rust_category: "InternalError",
                diagnostic_class: "SYS_FATAL",
            },
        }
    }

    pub const fn exit_code(self) -> i32 {
        self.exit_mapping().exit_code
    }

    pub const fn rust_category(self) -> &'static str {
        self.exit_mapping().rust_category
    }

    pub const fn diagnostic_class(self) -> &'static str {
        self.exit_mapping().diagnostic_class
    }

    /// Checkpoint corruption is recovered by restarting fresh, so it never
    /// terminates a run on its own.
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success | Self::ChecksumFailure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitMapping {
    pub exit_code: i32,
    pub rust_category: &'static str,
    pub diagnostic_class: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilkywayError {
    category: MilkywayErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl MilkywayError {
    pub fn new(
        category: MilkywayErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn configuration(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            MilkywayErrorCategory::ConfigurationError,
            placeholder,
            message,
        )
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MilkywayErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn numeric(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MilkywayErrorCategory::NumericDegeneracy, placeholder, message)
    }

    pub fn checksum(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MilkywayErrorCategory::ChecksumFailure, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MilkywayErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> MilkywayErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "WARNING"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for MilkywayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.rust_category(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for MilkywayError {}
