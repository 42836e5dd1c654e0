use thiserror::Error;

use crate::embed::oembed::FetchError;

/// The common error type used by the display controller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DisplayError {
    /// The host reference did not resolve to a usable DOM node
    #[error("You must pass either a valid element or a valid id: {0}")]
    InvalidElement(String),

    /// A bad event name, callback or construction parameter
    #[error("{0}")]
    InvalidArgument(String),

    /// `set` was called without a value
    #[error("There must be a value to set.")]
    MissingValue,

    /// The instance was destroyed or never finished construction
    #[error("Unknown display. Probably unloaded.")]
    UnknownInstance,

    /// The embedded content reported a failure for a specific method
    #[error("{name}: {message}")]
    Remote { name: String, message: String },

    /// The oEmbed descriptor could not be retrieved
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The embed URL or id is not served by the display domain family
    #[error("{0}")]
    NotEmbeddable(String),
}

impl DisplayError {
    /// Error class name exposed to script callers.
    pub fn name(&self) -> &str {
        match self {
            Self::Remote { name, .. } => name,
            Self::InvalidElement(_)
            | Self::InvalidArgument(_)
            | Self::MissingValue
            | Self::NotEmbeddable(_) => "TypeError",
            Self::UnknownInstance => "Error",
            Self::Fetch(_) => "FetchError",
        }
    }

    /// Message without the class name prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
