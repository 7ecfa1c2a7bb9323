use thiserror::Error;

/// Convenient result type for `trtool`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed record file. Carries the position of the offending field.
    #[error("{file}:{line}:{column}: {message}")]
    Format {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn format(
        file: impl Into<String>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Format {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }
}
