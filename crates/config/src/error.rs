use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// One or more required variables are unset or empty.
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid value for {var}: {message}")]
    Invalid { var: String, message: String },
}

impl Error {
    #[must_use]
    pub fn invalid(var: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Invalid {
            var: var.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
