use thiserror::Error;

use crate::registry::Provider;

/// Errors produced while obtaining registry credentials.
///
/// The login manager never constructs these itself; they come from the
/// provider client that handled the request and are passed through as-is.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid {provider} image: {image}")]
    InvalidImage { provider: Provider, image: String },

    #[error("{0} authentication failed: tried to get credentials from a provider that was not configured")]
    UnconfiguredProvider(Provider),

    #[error("{provider} authentication failed: {message}")]
    Provider { provider: Provider, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("login cancelled")]
    Cancelled,

    #[error("login deadline exceeded")]
    DeadlineExceeded,
}

impl LoginError {
    pub(crate) fn provider(provider: Provider, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }
}

pub type Result<T, E = LoginError> = std::result::Result<T, E>;
