//! Crate-level error types.

use crate::protocol::DecodeError;
use crate::transport;

/// Crate-level error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// USB transport failure (open, claim, reset or transfer).
    #[error("transport error: {0}")]
    Transport(#[from] transport::Error),

    /// A packet failed to decode.
    ///
    /// The acquisition loop absorbs these itself; this variant only reaches
    /// callers that invoke [`crate::protocol::decode`] directly.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The output sink rejected a sample or session transition.
    #[error("sink error: {context}: {source}")]
    Sink {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A background acquisition thread panicked.
    #[error("acquisition thread '{0}' panicked")]
    ThreadPanicked(&'static str),

    /// A simple error message.
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Create a simple message error.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    /// Create a sink error with context wrapping another error.
    pub fn sink(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Sink {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Crate-level result type.
pub type Result<T> = std::result::Result<T, Error>;
