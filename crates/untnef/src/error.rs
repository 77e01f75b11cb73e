//! Error types for envelope conversion.

use thiserror::Error;

/// Boxed error returned by an [`EnvelopeDecoder`](crate::EnvelopeDecoder).
pub type DecoderError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while converting a message.
#[derive(Debug, Error)]
pub enum Error {
    /// The envelope part was found but the decoder rejected its bytes.
    #[error("Envelope decode error: {0}")]
    EnvelopeDecode(#[source] DecoderError),

    /// The envelope part's transfer encoding does not match its content.
    #[error("Transport decode error: {0}")]
    TransportDecode(#[source] untnef_mime::Error),

    /// The input could not be parsed as a MIME message.
    #[error("MIME error: {0}")]
    Mime(#[from] untnef_mime::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Checks whether this error came from a malformed envelope payload,
    /// either at the transfer encoding or the envelope format level.
    #[must_use]
    pub const fn is_envelope_error(&self) -> bool {
        matches!(self, Self::EnvelopeDecode(_) | Self::TransportDecode(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
