use std::time::Duration;

use roundtrip_common::config::ClientTimeouts;
use serde::Deserialize;

use crate::error::ConfigError;

/// Probe settings, the `probe` section of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Seconds between probes
    #[serde(default = "defaults::interval_secs")]
    pub interval_secs: u64,

    /// Round trips slower than this are flagged
    #[serde(default = "defaults::expected_delivery_secs")]
    pub expected_delivery_secs: u32,

    /// Where probes are sent
    #[serde(default = "defaults::target")]
    pub target: String,

    /// The only recipient inbound mail is accepted for
    #[serde(default = "defaults::accept_address")]
    pub accept_address: String,

    /// Most probe records kept in memory
    #[serde(default = "defaults::max_history")]
    pub max_history: usize,

    /// Port probes are delivered to on the exchanger
    #[serde(default = "defaults::smtp_port")]
    pub smtp_port: u16,

    /// Upper bound for handing one probe to the exchanger
    #[serde(default = "defaults::send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Name sent in `EHLO`
    #[serde(default)]
    pub helo_name: Option<String>,

    /// Always deliver to this exchanger instead of looking up MX records
    #[serde(default)]
    pub mx_override: Option<String>,

    #[serde(default)]
    pub timeouts: ClientTimeouts,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval_secs(),
            expected_delivery_secs: defaults::expected_delivery_secs(),
            target: defaults::target(),
            accept_address: defaults::accept_address(),
            max_history: defaults::max_history(),
            smtp_port: defaults::smtp_port(),
            send_timeout_secs: defaults::send_timeout_secs(),
            helo_name: None,
            mx_override: None,
            timeouts: ClientTimeouts::default(),
        }
    }
}

impl ProbeConfig {
    /// Reject settings the monitor cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Zero {
                field: "probe.interval_secs",
            });
        }

        if self.max_history == 0 {
            return Err(ConfigError::Zero {
                field: "probe.max_history",
            });
        }

        if self.send_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "probe.send_timeout_secs",
            });
        }

        if self.smtp_port == 0 {
            return Err(ConfigError::Zero {
                field: "probe.smtp_port",
            });
        }

        for (field, value) in [
            ("probe.target", &self.target),
            ("probe.accept_address", &self.accept_address),
        ] {
            if domain_of(value).is_none() {
                return Err(ConfigError::InvalidAddress {
                    field,
                    value: value.clone(),
                });
            }
        }

        Ok(())
    }

    #[inline]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[inline]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    #[inline]
    pub fn expected_delivery(&self) -> f64 {
        f64::from(self.expected_delivery_secs)
    }

    /// Domain part of the probe target.
    pub fn target_domain(&self) -> &str {
        domain_of(&self.target).unwrap_or(&self.target)
    }

    /// Name used in `EHLO`, the system hostname unless configured.
    pub fn helo_name(&self) -> String {
        self.helo_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(roundtrip_common::hostname)
    }
}

/// `Some(domain)` when `address` looks like `local@domain`.
fn domain_of(address: &str) -> Option<&str> {
    address
        .rsplit_once('@')
        .filter(|(local, domain)| !local.is_empty() && !domain.is_empty())
        .map(|(_, domain)| domain)
}

mod defaults {
    pub const fn interval_secs() -> u64 {
        60
    }

    pub const fn expected_delivery_secs() -> u32 {
        25
    }

    pub fn target() -> String {
        "infra-roundtrip@apache.org".to_string()
    }

    pub fn accept_address() -> String {
        "roundtrip@roundtrip.apache.org".to_string()
    }

    pub const fn max_history() -> usize {
        crate::store::DEFAULT_CAPACITY
    }

    pub const fn smtp_port() -> u16 {
        25
    }

    pub const fn send_timeout_secs() -> u64 {
        30
    }
}
