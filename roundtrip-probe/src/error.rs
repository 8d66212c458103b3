//! Errors raised while dispatching a probe and while validating settings.
//!
//! A dispatch error never stops the emitter; its text becomes the `error`
//! column of the probe's record.

use std::time::Duration;

use roundtrip_smtp::client::ClientError;
use thiserror::Error;

use crate::dns::DnsError;

/// Why a probe could not be handed to an exchanger.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The probe target's exchangers could not be resolved.
    #[error("MX lookup failed: {0}")]
    Resolve(#[from] DnsError),

    /// TCP connection to the exchanger failed.
    #[error("Failed to connect to {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: ClientError,
    },

    /// The exchanger answered a command with a 4xx or 5xx reply.
    #[error("{stage} rejected by {server}: {code} {message}")]
    Rejected {
        server: String,
        stage: &'static str,
        code: u16,
        message: String,
    },

    /// A step, or the whole send, ran out of time.
    #[error("{stage} timed out after {timeout:?}")]
    Timeout {
        stage: &'static str,
        timeout: Duration,
    },

    /// Any other client failure mid-conversation.
    #[error("SMTP conversation failed: {0}")]
    Client(#[from] ClientError),
}

impl DispatchError {
    /// Returns `true` if a later probe could plausibly succeed where this failed.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        match self {
            Self::Resolve(err) => err.is_temporary(),
            Self::Rejected { code, .. } => *code < 500,
            Self::Connect { .. } | Self::Timeout { .. } | Self::Client(_) => true,
        }
    }
}

/// Invalid configuration, fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not an email address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}
