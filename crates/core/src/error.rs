use thiserror::Error;

/// Failure kinds surfaced by the completion client.
///
/// `Cancelled` is a user action, not a fault; callers should not report it
/// the way they report the other variants.
#[derive(Debug, Error)]
pub enum QuillError {
    /// Missing or unusable client configuration. No request was made.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The service rejected the request or the transport failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered successfully but no text could be extracted.
    #[error("response contained no text")]
    Decode,

    /// The in-flight request was cancelled.
    #[error("request cancelled")]
    Cancelled,
}
