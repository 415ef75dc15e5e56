//! Exit codes for the sa-core CLI.
//!
//! Exit code ranges:
//! - 0: success
//! - 10-19: user errors (bad arguments, model files, evidence)
//! - 20-29: internal errors (bugs, I/O)

use sa_common::{Error, ErrorCategory, QueryError};

/// Exit codes for sa-core commands.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command completed.
    Ok = 0,

    /// Invalid arguments.
    ArgsError = 10,

    /// Model definition or settings could not be loaded.
    ModelError = 11,

    /// Model loaded but `validate()` reported violations.
    InvalidModel = 12,

    /// Evidence or inference failed.
    QueryError = 13,

    /// Internal error (bug, please report).
    InternalError = 20,

    /// I/O error.
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Ok
    }

    /// Codes 10-19 can be resolved by the user.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&self.as_i32())
    }

    pub fn is_internal_error(self) -> bool {
        self.as_i32() >= 20
    }

    /// Stable name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Ok => "OK",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ModelError => "ERR_MODEL",
            ExitCode::InvalidModel => "ERR_INVALID_MODEL",
            ExitCode::QueryError => "ERR_QUERY",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Exit code for a failed command.
    pub fn for_error(error: &Error) -> Self {
        match error {
            Error::Query(QueryError::IncompleteModel { .. }) => ExitCode::InvalidModel,
            Error::Io(_) => ExitCode::IoError,
            _ => match error.category() {
                ErrorCategory::Construction | ErrorCategory::Table | ErrorCategory::Config => {
                    ExitCode::ModelError
                }
                ErrorCategory::Query => ExitCode::QueryError,
                ErrorCategory::Io => ExitCode::ModelError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
