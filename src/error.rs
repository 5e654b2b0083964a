use std::path::Path;
use thiserror::Error;

/// Everything that can go wrong between the presentation layer and the files.
///
/// Rows dropped for an unreadable date are not an error; the loader logs
/// them and reports a count instead.
#[derive(Debug, Error)]
pub enum TribesError {
    #[error("incorrect access code, try again")]
    AuthenticationFailed,

    #[error("log in before using this operation")]
    NotAuthenticated,

    #[error("corrupt data in {path}: {reason}")]
    CorruptData { path: String, reason: String },

    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot failure: {0}")]
    Snapshot(String),

    #[error("export failure: {0}")]
    Export(String),
}

impl TribesError {
    pub fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        Self::CorruptData {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// True for the errors a user fixes by logging in again.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed | Self::NotAuthenticated)
    }
}

impl From<bincode::Error> for TribesError {
    fn from(value: bincode::Error) -> Self {
        Self::Snapshot(value.to_string())
    }
}

pub type TribesResult<T> = Result<T, TribesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_the_field() {
        let err = TribesError::validation("points", "must not be negative");
        assert_eq!(err.to_string(), "invalid points: must not be negative");
        assert!(!err.is_auth());
    }

    #[test]
    fn corrupt_data_carries_the_path() {
        let err = TribesError::corrupt(Path::new("data/pontos_tribos.csv"), "missing column Tribe");
        assert_eq!(
            err.to_string(),
            "corrupt data in data/pontos_tribos.csv: missing column Tribe"
        );
    }

    #[test]
    fn auth_errors_are_flagged() {
        assert!(TribesError::AuthenticationFailed.is_auth());
        assert!(TribesError::NotAuthenticated.is_auth());
    }
}
