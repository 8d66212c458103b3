//! Timeout configuration for SMTP operations.
//!
//! The receiver (inbound probes) and the sender (outbound probes) need
//! different values: the receiver follows RFC 5321 section 4.5.3.2, the sender
//! keeps each step short so a stuck exchanger costs at most one probe.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Common interface for timeout configuration.
pub trait TimeoutConfig {
    /// Timeout for SMTP command processing.
    fn command_timeout(&self) -> Duration;

    /// Timeout for DATA command and message transfer.
    fn data_timeout(&self) -> Duration;

    /// Maximum connection duration.
    fn connection_timeout(&self) -> Duration;
}

/// Server-side SMTP timeout configuration (RFC 5321 compliant).
///
/// - MAIL/RCPT commands: 5 minutes
/// - DATA block: 3 minutes
/// - Overall connection: 30 minutes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTimeouts {
    /// Timeout for SMTP commands (HELO, EHLO, MAIL FROM, RCPT TO, etc.)
    ///
    /// Default: 300 seconds
    #[serde(default = "defaults::server_command_timeout_secs")]
    pub command_secs: u64,

    /// Timeout for receiving each block of message data.
    ///
    /// Default: 180 seconds
    #[serde(default = "defaults::server_data_block_secs")]
    pub data_block_secs: u64,

    /// Maximum total connection duration.
    ///
    /// Default: 1800 seconds
    #[serde(default = "defaults::server_connection_secs")]
    pub connection_secs: u64,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            command_secs: defaults::server_command_timeout_secs(),
            data_block_secs: defaults::server_data_block_secs(),
            connection_secs: defaults::server_connection_secs(),
        }
    }
}

impl TimeoutConfig for ServerTimeouts {
    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_block_secs)
    }

    fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_secs)
    }
}

/// Client-side SMTP timeout configuration used when dispatching probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTimeouts {
    /// Timeout for establishing the TCP connection.
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::client_connect_secs")]
    pub connect_secs: u64,

    /// Timeout for each envelope command (EHLO, MAIL FROM, RCPT TO).
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::client_command_secs")]
    pub command_secs: u64,

    /// Timeout for DATA command and message transfer.
    ///
    /// Default: 120 seconds
    #[serde(default = "defaults::client_data_secs")]
    pub data_secs: u64,

    /// Timeout for QUIT command. A QUIT timeout does not fail the probe.
    ///
    /// Default: 10 seconds
    #[serde(default = "defaults::client_quit_secs")]
    pub quit_secs: u64,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::client_connect_secs(),
            command_secs: defaults::client_command_secs(),
            data_secs: defaults::client_data_secs(),
            quit_secs: defaults::client_quit_secs(),
        }
    }
}

mod defaults {
    pub const fn server_command_timeout_secs() -> u64 {
        300
    }
    pub const fn server_data_block_secs() -> u64 {
        180
    }
    pub const fn server_connection_secs() -> u64 {
        1800
    }

    pub const fn client_connect_secs() -> u64 {
        30
    }
    pub const fn client_command_secs() -> u64 {
        30
    }
    pub const fn client_data_secs() -> u64 {
        120
    }
    pub const fn client_quit_secs() -> u64 {
        10
    }
}
