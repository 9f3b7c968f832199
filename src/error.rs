//! Application-level error with a process exit code.
//!
//! Library modules report typed errors (`SchemaError`, `FitError`, ...). At the
//! application boundary they are folded into `AppError`, which carries the exit
//! code the binary returns:
//!
//! - `2`: unreadable input, bad configuration, malformed columns
//! - `3`: no usable data, no viable detection model
//! - `4`: numerical failure (variance, estimation)

use crate::config::ConfigError;
use crate::fit::FitError;
use crate::schema::SchemaError;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<SchemaError> for AppError {
    fn from(err: SchemaError) -> Self {
        let code = match err {
            SchemaError::NoSamples | SchemaError::NoDetections => 3,
            _ => 2,
        };
        AppError::new(code, err.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::InvalidOptions(_) => 2,
            FitError::InsufficientData { .. }
            | FitError::NoViableModel
            | FitError::Infeasible { .. }
            | FitError::NotConverged { .. } => 3,
            FitError::Optimizer(_) | FitError::Variance(_) => 4,
        };
        AppError::new(code, err.to_string())
    }
}
