//! HTTP server configuration

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the monitoring endpoints, the `http` section of the
/// configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address to bind the HTTP server
    ///
    /// Common values:
    /// - `[::]:8080` (IPv6 any address, port 8080)
    /// - `0.0.0.0:8080` (IPv4 any address, port 8080)
    /// - `127.0.0.1:8080` (localhost only, port 8080)
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Requests taking longer than this are answered with 408
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Number of probes shown on `/detailed`
    #[serde(default = "default_detail_rows")]
    pub detail_rows: usize,
}

fn default_listen_address() -> String {
    "[::]:8080".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    10
}

const fn default_detail_rows() -> usize {
    roundtrip_probe::DEFAULT_DETAIL_ROWS
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            request_timeout_secs: default_request_timeout_secs(),
            detail_rows: default_detail_rows(),
        }
    }
}

impl HttpConfig {
    /// Bound for each reverse lookup on `/detailed`, half the request timeout
    /// so the page always renders in time.
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs) / 2
    }
}
