use std::{io, time::Duration};
use thiserror::Error;

use crate::endpoint::Endpoint;

/// Startup-time configuration failures. None of these are recoverable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid admission range {range:?}: expected CIDR notation such as 10.0.0.0/8")]
    InvalidRange { range: String },

    #[error("Invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: &'static str },
}

/// Outcome of a failed outbound dial, classified by cause.
#[derive(Debug, Error)]
pub enum DialError {
    /// `after` is the configured bound, or `None` when the OS gave up first.
    #[error("Dial to {destination} timed out")]
    Timeout {
        destination: Endpoint,
        after: Option<Duration>,
    },

    #[error("Dial to {destination} failed: {source}")]
    Other {
        destination: Endpoint,
        #[source]
        source: io::Error,
    },
}

impl DialError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to bind listener on {endpoint}: {source}")]
    Bind {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },
}
