use std::error::Error as StdError;

/// Failures of a proxied call. Most public operations absorb these into an
/// absent result; [`crate::QueryOutcome::Failed`] carries them for callers
/// that need to tell failure from emptiness.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request could not be sent or the response body not read.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The bot host answered with a non-success status.
    #[error("bot host returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response was not in the expected shape.
    #[error("malformed response: {message}")]
    Decode { message: String },

    /// The bot host processed the request and reported failure.
    #[error("request rejected: {message}")]
    Rejected { message: String },

    /// A caller-supplied argument was refused before any request was made.
    #[error("invalid argument: {message}")]
    Validation { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn decode(message: impl std::fmt::Display) -> Self {
        Self::Decode {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn validation(message: impl std::fmt::Display) -> Self {
        Self::Validation {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::decode(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
