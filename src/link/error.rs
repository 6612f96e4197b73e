//! Error definitions for the link module.

use thiserror::Error;

/// Error types for the broker link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Connection to the broker could not be established
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// A reconnect cycle ran out of attempts
    #[error("reconnect attempts exhausted after {0} tries")]
    RetriesExhausted(u32),

    /// Publishing a message failed
    #[error("publish error: {0}")]
    PublishError(String),

    /// Subscribing to the command topic failed
    #[error("subscribe error: {0}")]
    SubscribeError(String),

    /// Channel communication failure
    #[error("channel error: {0}")]
    ChannelError(String),
}
