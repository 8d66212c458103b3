//! DNS lookups the probe pipeline depends on.
//!
//! The emitter needs the mail exchangers of the probe target's domain, the
//! reporter needs reverse lookups for the peers that delivered probes back.
//! Both are traits so tests and pinned deployments can supply fixed answers.

use std::{collections::HashMap, net::IpAddr, time::Duration};

use async_trait::async_trait;
use hickory_resolver::{
    TokioResolver, config::ResolverOpts, name_server::TokioConnectionProvider,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during DNS resolution.
#[derive(Debug, Error)]
pub enum DnsError {
    /// DNS query failed due to network or resolver issues.
    #[error("DNS lookup failed: {0}")]
    LookupFailed(#[from] hickory_resolver::ResolveError),

    /// DNS query timed out.
    #[error("DNS query timed out for {0}")]
    Timeout(String),

    /// No PTR record exists for the address.
    #[error("No PTR record for {0}")]
    NoPtr(IpAddr),

    /// Resolution is unavailable for this name.
    #[error("DNS resolution unavailable for {0}")]
    Unavailable(String),
}

impl DnsError {
    /// Returns `true` if this error is temporary and a later probe may succeed.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::LookupFailed(_))
    }
}

/// Configuration for DNS resolver.
#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    /// DNS query timeout in seconds (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    5
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Resolves a domain to its mail exchangers.
#[async_trait]
pub trait MxResolver: Send + Sync {
    /// Exchanger hostnames without the trailing dot, most preferred first.
    ///
    /// An empty list means the domain has no MX records.
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<String>, DnsError>;
}

/// Resolves an address back to a hostname.
#[async_trait]
pub trait PeerResolver: Send + Sync {
    /// The first PTR name for `ip`, without the trailing dot.
    async fn reverse(&self, ip: IpAddr) -> Result<String, DnsError>;
}

/// System resolver backed by `hickory-resolver`.
#[derive(Debug)]
pub struct DnsResolver {
    resolver: TokioResolver,
    timeout: Duration,
}

impl DnsResolver {
    /// Creates a new DNS resolver with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration cannot be loaded.
    pub fn new() -> Result<Self, DnsError> {
        Self::with_dns_config(&DnsConfig::default())
    }

    /// Creates a new DNS resolver from the system configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolver cannot be initialized.
    pub fn with_dns_config(dns_config: &DnsConfig) -> Result<Self, DnsError> {
        let timeout = Duration::from_secs(dns_config.timeout_secs);

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())?
            .with_options(opts)
            .build();

        Ok(Self { resolver, timeout })
    }
}

#[async_trait]
impl MxResolver for DnsResolver {
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        debug!("Resolving mail exchangers for domain: {domain}");

        let lookup = tokio::time::timeout(self.timeout, self.resolver.mx_lookup(domain))
            .await
            .map_err(|_| DnsError::Timeout(domain.to_string()))?;

        match lookup {
            Ok(mx_lookup) => {
                let mut records: Vec<_> = mx_lookup
                    .iter()
                    .map(|mx| (mx.preference(), mx.exchange().to_utf8()))
                    .collect();
                records.sort_by_key(|(preference, _)| *preference);

                let exchangers: Vec<String> = records
                    .into_iter()
                    .map(|(_, host)| host.trim_end_matches('.').to_string())
                    .filter(|host| !host.is_empty())
                    .collect();

                debug!("Resolved {} MX record(s) for {domain}", exchangers.len());
                Ok(exchangers)
            }
            Err(err) if err.is_no_records_found() => {
                debug!("No MX records found for {domain}");
                Ok(Vec::new())
            }
            Err(err) => {
                warn!("MX lookup failed for {domain}: {err}");
                Err(DnsError::LookupFailed(err))
            }
        }
    }
}

#[async_trait]
impl PeerResolver for DnsResolver {
    async fn reverse(&self, ip: IpAddr) -> Result<String, DnsError> {
        let lookup = tokio::time::timeout(self.timeout, self.resolver.reverse_lookup(ip))
            .await
            .map_err(|_| DnsError::Timeout(ip.to_string()))?
            .map_err(|err| {
                if err.is_no_records_found() {
                    DnsError::NoPtr(ip)
                } else {
                    DnsError::LookupFailed(err)
                }
            })?;

        lookup
            .iter()
            .map(|ptr| ptr.0.to_utf8().trim_end_matches('.').to_string())
            .find(|name| !name.is_empty())
            .ok_or(DnsError::NoPtr(ip))
    }
}

/// Fixed answers, for tests and for deployments that pin the exchanger.
///
/// Domains without an entry have no MX records; addresses without an entry
/// have no PTR record.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    exchangers: HashMap<String, Vec<String>>,
    names: HashMap<IpAddr, String>,
    unavailable: bool,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mx(mut self, domain: impl Into<String>, exchangers: &[&str]) -> Self {
        self.exchangers.insert(
            domain.into().to_ascii_lowercase(),
            exchangers.iter().map(ToString::to_string).collect(),
        );
        self
    }

    #[must_use]
    pub fn with_ptr(mut self, ip: IpAddr, name: impl Into<String>) -> Self {
        self.names.insert(ip, name.into());
        self
    }

    /// Every MX lookup fails.
    #[must_use]
    pub const fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }
}

#[async_trait]
impl MxResolver for StaticResolver {
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        if self.unavailable {
            return Err(DnsError::Unavailable(domain.to_string()));
        }

        Ok(self
            .exchangers
            .get(&domain.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl PeerResolver for StaticResolver {
    async fn reverse(&self, ip: IpAddr) -> Result<String, DnsError> {
        self.names.get(&ip).cloned().ok_or(DnsError::NoPtr(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires network access"]
    async fn test_mx_lookup_gmail() {
        let resolver = DnsResolver::new().unwrap();
        let exchangers = resolver.resolve_mx("gmail.com").await.unwrap();

        assert!(!exchangers.is_empty());
        assert!(exchangers.iter().all(|host| !host.ends_with('.')));
    }

    #[tokio::test]
    #[ignore = "Requires network access"]
    async fn test_reverse_lookup() {
        let resolver = DnsResolver::new().unwrap();
        let name = resolver.reverse("8.8.8.8".parse().unwrap()).await.unwrap();
        assert_eq!(name, "dns.google");
    }

    #[tokio::test]
    async fn static_resolver_answers() {
        let ip: IpAddr = "192.0.2.10".parse().unwrap();
        let resolver = StaticResolver::new()
            .with_mx("Example.org", &["mx1.example.org", "mx2.example.org"])
            .with_ptr(ip, "relay.example.org");

        assert_eq!(
            resolver.resolve_mx("example.org").await.unwrap(),
            ["mx1.example.org", "mx2.example.org"]
        );
        assert!(resolver.resolve_mx("other.org").await.unwrap().is_empty());
        assert_eq!(resolver.reverse(ip).await.unwrap(), "relay.example.org");
        assert!(matches!(
            resolver.reverse("192.0.2.11".parse().unwrap()).await,
            Err(DnsError::NoPtr(_))
        ));
    }

    #[tokio::test]
    async fn unavailable_static_resolver_fails() {
        let resolver = StaticResolver::new().unavailable();
        assert!(matches!(
            resolver.resolve_mx("example.org").await,
            Err(DnsError::Unavailable(_))
        ));
    }

    #[test]
    fn test_dns_error_is_temporary() {
        assert!(DnsError::Timeout("example.com".to_string()).is_temporary());
        assert!(!DnsError::Unavailable("example.com".to_string()).is_temporary());
        assert!(!DnsError::NoPtr("192.0.2.1".parse().unwrap()).is_temporary());
    }
}
