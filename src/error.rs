//! Error types.
//!
//! Two layers:
//!
//! - [`EstimateError`]: what the library operations fail with. Every hard error
//!   carries enough context (field, row index) to locate the bad input.
//! - [`AppError`]: what the binary reports, an exit code plus a message.

/// Failure of an estimation step.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EstimateError {
    /// Missing or malformed input file, missing keys, unequal column lengths.
    #[error("data load error: {0}")]
    DataLoad(String),
    /// A value outside the domain of a formula (e.g. `z <= -1` for the
    /// relativistic Doppler formula, or a non-finite distance).
    #[error("domain error: {0}")]
    Domain(String),
    /// Fewer paired observations than the operation needs.
    #[error("insufficient data: need at least {needed} paired observations, got {got}")]
    InsufficientData { needed: usize, got: usize },
    /// Parameter bounds or guesses that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EstimateError {
    /// Domain error pinned to one row of the dataset.
    pub fn domain_at(field: &str, row: usize, message: impl std::fmt::Display) -> Self {
        EstimateError::Domain(format!("{field} at row {row}: {message}"))
    }
}

pub type EstimateResult<T> = Result<T, EstimateError>;

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

impl From<EstimateError> for AppError {
    fn from(err: EstimateError) -> Self {
        let exit_code = match &err {
            EstimateError::DataLoad(_) | EstimateError::InvalidConfig(_) => 2,
            EstimateError::InsufficientData { .. } => 3,
            EstimateError::Domain(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
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
