use std::{
    net::SocketAddr,
    sync::{Arc, LazyLock},
};

use futures_util::future::join_all;
use roundtrip_common::{Signal, hostname, internal, logging};
use roundtrip_http::{HttpConfig, MonitorServer, MonitorState};
use roundtrip_probe::{
    ConfigError, Correlator, DnsConfig, DnsResolver, Emitter, MxResolver, PeerResolver,
    ProbeConfig, ProbeState, Reporter, SmtpTransport, SystemClock,
};
use roundtrip_smtp::{Listener, SmtpConfig};
use serde::Deserialize;
use tokio::{sync::broadcast, task::JoinHandle};

/// The whole configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct RoundTrip {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub dns: DnsConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

/// The started components.
pub struct Running {
    pub smtp_address: SocketAddr,
    pub http_address: SocketAddr,
    pub state: Arc<ProbeState>,
    tasks: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl Running {
    /// Wait for every component to stop.
    ///
    /// # Errors
    ///
    /// Returns the first error a component stopped with.
    pub async fn wait(self) -> anyhow::Result<()> {
        for result in join_all(self.tasks).await {
            result??;
        }

        Ok(())
    }
}

async fn shutdown_requested() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    Ok(())
}

impl RoundTrip {
    /// Parse a configuration file. Optional values may be written without
    /// `Some(..)`.
    ///
    /// # Errors
    ///
    /// Returns the parse error with its position in `text`.
    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .from_str(text)
    }

    /// Reject settings the monitor cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.probe.validate()?;

        if self.http.detail_rows == 0 {
            return Err(ConfigError::Zero {
                field: "http.detail_rows",
            });
        }

        if self.dns.timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "dns.timeout_secs",
            });
        }

        Ok(())
    }

    /// Run the monitor until SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a socket cannot be
    /// bound, or a component stops with an error.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        let running = self.start(&SHUTDOWN_BROADCAST).await?;
        internal!(
            level = INFO,
            smtp = %running.smtp_address,
            http = %running.http_address,
            "Round trip monitor running"
        );

        let components = running.wait();
        tokio::pin!(components);

        tokio::select! {
            r = &mut components => {
                internal!(level = ERROR, "Components stopped without being asked to");
                return r;
            }
            r = shutdown_requested() => r?,
        }

        // Every receiver gone means every component has already stopped
        let _ = SHUTDOWN_BROADCAST.send(Signal::Shutdown);
        internal!(level = INFO, "Shutting down...");

        tokio::select! {
            r = &mut components => r,
            _ = tokio::signal::ctrl_c() => {
                internal!(level = WARN, "Forcing shutdown");
                Ok(())
            }
        }
    }

    /// Validate, bind and spawn every component using the system resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the resolver cannot
    /// be created or a socket cannot be bound.
    pub async fn start(self, shutdown: &broadcast::Sender<Signal>) -> anyhow::Result<Running> {
        let resolver = Arc::new(DnsResolver::with_dns_config(&self.dns)?);
        self.start_with(resolver.clone(), resolver, shutdown).await
    }

    /// [`Self::start`] with the given resolvers.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a socket cannot
    /// be bound.
    pub async fn start_with(
        self,
        mx: Arc<dyn MxResolver>,
        peers: Arc<dyn PeerResolver>,
        shutdown: &broadcast::Sender<Signal>,
    ) -> anyhow::Result<Running> {
        self.validate()?;

        let Self {
            probe, smtp, http, ..
        } = self;

        let state = Arc::new(ProbeState::new(probe.max_history, Arc::new(SystemClock)));

        let correlator = Arc::new(Correlator::new(state.clone(), probe.accept_address.clone()));
        let listener = Listener::bind(&smtp, correlator).await?;
        let smtp_address = listener.local_addr()?;

        let reporter = Reporter::new(
            state.clone(),
            peers,
            probe.expected_delivery(),
            http.detail_rows,
        )
        .with_lookup_timeout(http.lookup_timeout());
        let monitor = MonitorServer::new(
            &http,
            Arc::new(MonitorState::new(reporter, hostname())?),
        )
        .await?;
        let http_address = monitor.local_addr()?;

        let transport = Arc::new(SmtpTransport::new(
            probe.helo_name(),
            probe.timeouts.clone(),
            probe.send_timeout(),
        ));
        let emitter = Emitter::new(state.clone(), mx, transport, probe);

        let tasks = vec![
            tokio::spawn({
                let receiver = shutdown.subscribe();
                async move { Ok(listener.serve(receiver).await?) }
            }),
            tokio::spawn({
                let receiver = shutdown.subscribe();
                async move { Ok(monitor.serve(receiver).await?) }
            }),
            tokio::spawn({
                let receiver = shutdown.subscribe();
                async move {
                    emitter.run(receiver).await;
                    Ok(())
                }
            }),
        ];

        Ok(Running {
            smtp_address,
            http_address,
            state,
            tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = RoundTrip::from_ron("()").unwrap();
        assert_eq!(config.probe.interval_secs, 60);
        assert_eq!(config.probe.target, "infra-roundtrip@apache.org");
        assert_eq!(config.smtp.listen_address.port(), 25);
        assert_eq!(config.http.listen_address, "[::]:8080");
        assert_eq!(config.dns.timeout_secs, 5);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn sections_are_read() {
        let config = RoundTrip::from_ron(
            r#"(
                probe: (
                    interval_secs: 30,
                    target: "probe@example.net",
                    accept_address: "back@monitor.example.org",
                ),
                smtp: (
                    listen_address: "127.0.0.1:2525",
                    banner: "monitor.example.org",
                ),
                http: (listen_address: "127.0.0.1:8081", detail_rows: 10),
                dns: (timeout_secs: 2),
            )"#,
        )
        .unwrap();

        assert_eq!(config.probe.interval_secs, 30);
        assert_eq!(config.probe.target_domain(), "example.net");
        assert_eq!(config.smtp.banner(), "monitor.example.org");
        assert_eq!(config.smtp.listen_address.port(), 2525);
        assert_eq!(config.http.detail_rows, 10);
        assert_eq!(config.dns.timeout_secs, 2);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn optional_values_may_be_bare_or_wrapped() {
        let config = RoundTrip::from_ron(
            r#"(
                probe: (helo_name: "client.example.org", mx_override: Some("192.0.2.7")),
                smtp: (banner: "monitor.example.org"),
            )"#,
        )
        .unwrap();

        assert_eq!(config.probe.helo_name(), "client.example.org");
        assert_eq!(config.probe.mx_override.as_deref(), Some("192.0.2.7"));
        assert_eq!(config.smtp.banner(), "monitor.example.org");
    }

    #[test]
    fn sample_file_loads_with_every_option_enabled() {
        let sample = include_str!("../../roundtrip.config.ron")
            .replace("// helo_name:", "helo_name:")
            .replace("// mx_override:", "mx_override:")
            .replace("// banner:", "banner:");

        let config = RoundTrip::from_ron(&sample).unwrap();
        assert_eq!(config.probe.helo_name.as_deref(), Some("roundtrip.apache.org"));
        assert_eq!(config.probe.mx_override.as_deref(), Some("mx1.example.org"));
        assert_eq!(config.smtp.banner.as_deref(), Some("roundtrip.apache.org"));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = RoundTrip::default();
        config.http.detail_rows = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "http.detail_rows"
            })
        );

        let mut config = RoundTrip::default();
        config.probe.interval_secs = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "probe.interval_secs"
            })
        );

        let config = RoundTrip::from_ron(r#"(probe: (accept_address: "nobody"))"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress { field: "probe.accept_address", .. })
        ));
    }
}
