//! Periodically sends a uniquely identified probe towards the probe target.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use rand::seq::IndexedRandom;
use roundtrip_common::{Signal, internal, outgoing, tracing};
use roundtrip_smtp::client::MessageBuilder;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::{
    config::ProbeConfig,
    dns::MxResolver,
    error::DispatchError,
    header::{PROBE_HEADER, ProbeHeader},
    record::ProbeRecord,
    state::ProbeState,
    transport::{OutboundProbe, ProbeTransport},
};

/// Body of every probe message.
pub const PROBE_BODY: &str = "Sent via roundtrip";

pub struct Emitter {
    state: Arc<ProbeState>,
    resolver: Arc<dyn MxResolver>,
    transport: Arc<dyn ProbeTransport>,
    config: ProbeConfig,
}

impl Emitter {
    pub fn new(
        state: Arc<ProbeState>,
        resolver: Arc<dyn MxResolver>,
        transport: Arc<dyn ProbeTransport>,
        config: ProbeConfig,
    ) -> Self {
        Self {
            state,
            resolver,
            transport,
            config,
        }
    }

    /// Send one probe and record the outcome.
    ///
    /// Never fails: a probe that could not be sent is recorded with its
    /// error, and the record is returned either way.
    pub async fn tick(&self) -> ProbeRecord {
        let id = Uuid::new_v4().to_string();
        let sent_at = unix_seconds(self.state.now());

        let exchanger = match self.choose_exchanger().await {
            Ok(exchanger) => exchanger,
            Err(err) => {
                log_failure(&id, None, &err);
                let record = ProbeRecord::failed(id, sent_at, None, err.to_string());
                self.state.append(record.clone());
                return record;
            }
        };

        // Registered before the hand-off, a quick round trip must find it
        let record = ProbeRecord::sending(id, sent_at, Some(exchanger));
        self.state.append(record.clone());

        match self.send(&record).await {
            Ok(()) => self.state.mark_sent(&record.id).unwrap_or(ProbeRecord {
                sending: false,
                ..record
            }),
            Err(err) => {
                log_failure(&record.id, record.via_mx.as_deref(), &err);
                let error = err.to_string();
                self.state
                    .set_error(&record.id, error.clone())
                    .unwrap_or_else(|| {
                        let mut record = record;
                        record.mark_failed(error);
                        record
                    })
            }
        }
    }

    async fn send(&self, record: &ProbeRecord) -> Result<(), DispatchError> {
        let exchanger = record
            .via_mx
            .clone()
            .unwrap_or_else(|| self.config.target_domain().to_string());

        outgoing!(
            level = INFO,
            probe_id = %record.id,
            via = %exchanger,
            "Sending probe to {}",
            self.config.target
        );

        let probe = OutboundProbe {
            exchanger,
            port: self.config.smtp_port,
            sender: self.config.accept_address.clone(),
            recipient: self.config.target.clone(),
            message: self.build_message(&record.id, record.sent_at),
        };

        self.transport.send(&probe).await
    }

    /// Pick one of the target domain's exchangers at random, or the domain
    /// itself when it has none.
    async fn choose_exchanger(&self) -> Result<String, DispatchError> {
        if let Some(exchanger) = self.config.mx_override.as_ref() {
            return Ok(exchanger.clone());
        }

        let domain = self.config.target_domain();
        let exchangers = self.resolver.resolve_mx(domain).await?;

        Ok(exchangers
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| domain.to_string()))
    }

    fn build_message(&self, id: &str, sent_at: i64) -> String {
        let accept = &self.config.accept_address;
        let date = DateTime::<Utc>::from_timestamp(sent_at, 0)
            .unwrap_or_default()
            .with_timezone(&Local)
            .to_rfc2822();

        MessageBuilder::new()
            .from(accept)
            .to(&self.config.target)
            .subject(format!("Round Trip Probe, {}", self.state.now()))
            .header("Date", date)
            .header("Message-ID", format!("<{id}-{accept}>"))
            .header(PROBE_HEADER, ProbeHeader::value(id, sent_at))
            .body(PROBE_BODY)
            .build()
    }

    /// Send a probe, sleep for the interval, repeat until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<Signal>) {
        internal!(
            level = INFO,
            "Probe emitter sending to {} every {}s",
            self.config.target,
            self.config.interval_secs
        );

        loop {
            self.tick().await;

            let sleep = tokio::time::sleep(self.config.interval());
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    () = &mut sleep => break,
                    sig = shutdown.recv() => {
                        if matches!(sig, Ok(Signal::Shutdown) | Err(RecvError::Closed)) {
                            internal!(level = INFO, "Probe emitter received shutdown signal");
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn log_failure(id: &str, via: Option<&str>, err: &DispatchError) {
    tracing::warn!(
        probe_id = %id,
        via = via.unwrap_or("???"),
        error = %err,
        temporary = err.is_temporary(),
        "Sending probe failed"
    );
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "Unix seconds fit comfortably in an i64"
)]
fn unix_seconds(now: f64) -> i64 {
    now.floor() as i64
}
