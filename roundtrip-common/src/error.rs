use std::io;

use thiserror::Error;

/// Why an inbound SMTP session ended early.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The client broke the protocol, e.g. hung up in the middle of DATA.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Connection(#[from] io::Error),

    /// A read or the connection lifetime limit ran out, in seconds.
    #[error("Timed out after {0}s")]
    Timeout(u64),
}

impl SessionError {
    /// Whether the session ended because of the client rather than us.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Timeout(_))
    }
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Unable to listen on {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Unable to accept connection: {0}")]
    AcceptFailed(#[from] io::Error),
}
