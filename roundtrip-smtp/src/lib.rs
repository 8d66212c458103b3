//! SMTP plumbing for the round trip monitor.
//!
//! The receiving side ([`listener`], [`session`]) accepts inbound mail and
//! passes each finished message to a [`TransactionHandler`]. The sending side
//! lives in [`client`].

pub mod client;
pub mod command;
pub mod envelope;
pub mod listener;
pub mod session;
pub mod transaction_handler;

use std::net::SocketAddr;

use roundtrip_common::config::ServerTimeouts;
use serde::Deserialize;

pub use envelope::Envelope;
pub use listener::Listener;
pub use transaction_handler::{Reply, TransactionHandler};

/// Receiver settings, the `smtp` section of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// Address the receiver listens on
    #[serde(default = "defaults::listen_address")]
    pub listen_address: SocketAddr,

    /// Name announced in the greeting, defaults to the system hostname
    #[serde(default)]
    pub banner: Option<String>,

    /// Largest message accepted in bytes, 0 for no limit
    #[serde(default = "defaults::max_message_size")]
    pub max_message_size: usize,

    #[serde(default)]
    pub timeouts: ServerTimeouts,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            listen_address: defaults::listen_address(),
            banner: None,
            max_message_size: defaults::max_message_size(),
            timeouts: ServerTimeouts::default(),
        }
    }
}

impl SmtpConfig {
    /// The configured banner, falling back to the system hostname.
    pub fn banner(&self) -> String {
        self.banner
            .clone()
            .filter(|banner| !banner.is_empty())
            .unwrap_or_else(roundtrip_common::hostname)
    }
}

mod defaults {
    use std::net::{Ipv6Addr, SocketAddr};

    pub const fn listen_address() -> SocketAddr {
        SocketAddr::new(std::net::IpAddr::V6(Ipv6Addr::UNSPECIFIED), 25)
    }

    pub const fn max_message_size() -> usize {
        10 * 1024 * 1024
    }
}
