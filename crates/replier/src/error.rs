use std::error::Error as StdError;

/// Errors surfaced by the reply dispatcher and its transports.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    /// The image could not be read, decoded or re-encoded as PNG.
    #[error("image encoding failed: {context}: {source}")]
    Encoding {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The dispatcher was shut down and accepts no further messages.
    #[error("reply dispatcher is closed")]
    Closed,

    /// The reply endpoint answered with a non-success status.
    #[error("reply endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl Error {
    #[must_use]
    pub fn encoding(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Encoding {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
