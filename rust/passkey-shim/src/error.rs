//! Error types for the interception shim.

use thiserror::Error;

use crate::wire::MessageType;

/// Message used for every rejection that mirrors the native `AbortError`.
pub const NOT_ALLOWED_MESSAGE: &str = "The operation either timed out or was not allowed.";

/// Errors raised by the shim while servicing a page credential call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShimError {
    /// The options routed to delegation carry no `publicKey` section.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The delegate answered with a message of the wrong type.
    #[error("protocol mismatch: expected {expected}, received {received}")]
    ProtocolMismatch {
        /// The response type the request calls for.
        expected: MessageType,
        /// The type that actually arrived.
        received: MessageType,
    },

    /// The delegate could not or would not service the request and asked the
    /// page to use the native implementation instead. Reaches the page as the
    /// delegate raised it when no fallback is possible.
    #[error("{name}: {message}")]
    DelegationDeclined {
        /// The error name reported by the delegate.
        name: String,
        /// Human readable detail.
        message: String,
    },

    /// The delegate rejected the request outright.
    #[error("{name}: {message}")]
    Remote {
        /// The `DOMException`-style name the delegate reported.
        name: String,
        /// Human readable detail.
        message: String,
    },

    /// The channel to the delegate is closed or broken.
    #[error("{0}")]
    ChannelFailure(String),

    /// The caller's signal was aborted.
    #[error("{}", NOT_ALLOWED_MESSAGE)]
    Aborted,

    /// The window never gained focus within the allotted time.
    #[error("{}", NOT_ALLOWED_MESSAGE)]
    FocusTimeout,

    /// The page has no native WebAuthn implementation to fall back to.
    #[error("Webauthn not supported in this browser.")]
    NotSupported,

    /// A delegate result carried a field that could not be decoded.
    #[error("malformed delegate result: {0}")]
    MalformedResult(String),

    /// The document is not one the shim intercepts.
    #[error("document is not eligible for interception")]
    Ineligible,
}

impl ShimError {
    /// Whether this failure allows the native implementation to take over.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self, ShimError::DelegationDeclined { .. })
    }

    /// The `DOMException` name a native implementation would use for an
    /// equivalent failure.
    pub fn dom_name(&self) -> &str {
        match self {
            ShimError::InvalidInput(_) => "TypeError",
            ShimError::ProtocolMismatch { .. }
            | ShimError::ChannelFailure(_)
            | ShimError::MalformedResult(_) => "UnknownError",
            ShimError::DelegationDeclined { name, .. } | ShimError::Remote { name, .. } => name,
            ShimError::Aborted | ShimError::FocusTimeout => "AbortError",
            ShimError::NotSupported | ShimError::Ineligible => "NotSupportedError",
        }
    }

    /// The message a page sees. Errors raised by the delegate or the
    /// transport keep their own text.
    pub fn page_message(&self) -> String {
        match self {
            ShimError::DelegationDeclined { message, .. }
            | ShimError::Remote { message, .. }
            | ShimError::ChannelFailure(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Failures reported by the transport that carries envelopes to the delegate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The delegate answered with an error.
    #[error("{name}: {message}")]
    Remote {
        /// The error name reported by the delegate.
        name: String,
        /// Human readable detail.
        message: String,
        /// Set when the delegate wants the page to use its native API.
        fallback_requested: bool,
    },

    /// The request was aborted through its signal.
    #[error("request aborted")]
    Aborted,

    /// The channel has been torn down.
    #[error("channel closed")]
    Closed,

    /// Anything else that went wrong in transit.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<ChannelError> for ShimError {
    fn from(error: ChannelError) -> Self {
        match error {
            ChannelError::Remote {
                name,
                message,
                fallback_requested: true,
            } => ShimError::DelegationDeclined { name, message },
            ChannelError::Remote { name, message, .. } => ShimError::Remote { name, message },
            ChannelError::Aborted => ShimError::Aborted,
            ChannelError::Closed => ShimError::ChannelFailure("channel closed".into()),
            ChannelError::Transport(message) => ShimError::ChannelFailure(message),
        }
    }
}
