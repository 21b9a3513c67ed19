use serde::Serialize;
use thiserror::Error;

/// Structured error type for the application. Every surface (CLI, script
/// session) can match on the error code instead of parsing strings.
#[derive(Debug, Clone, Serialize, Error)]
#[serde(tag = "code", content = "detail")]
pub enum AppError {
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },
    #[error("{message}")]
    ValidationError { message: String },
    #[error("Parse error: {message}")]
    ParseError { message: String },
    #[error("I/O error: {message}")]
    IoError { message: String },
    #[error("No project loaded")]
    NoProject,
    #[error("Command failed: {message}")]
    CommandFailed { message: String },
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoError {
            message: e.to_string(),
        }
    }
}

impl From<CommandError> for AppError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::NoProject => AppError::NoProject,
            CommandError::NotFound { what } => AppError::NotFound { what },
            CommandError::InvalidParameter { message } => AppError::ValidationError { message },
            other => AppError::CommandFailed {
                message: other.to_string(),
            },
        }
    }
}

/// Failure result of `Command::apply`.
///
/// Independent of any `error` lines the command reported while running: a
/// command may report several problems and still succeed, or fail silently.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },
    #[error("No project loaded")]
    NoProject,
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("Cancelled by user")]
    Cancelled,
    #[error("{message}")]
    Failed { message: String },
}

impl CommandError {
    pub fn failed(message: impl Into<String>) -> Self {
        CommandError::Failed {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        CommandError::InvalidParameter {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        CommandError::InvalidParameter {
            message: e.to_string(),
        }
    }
}
