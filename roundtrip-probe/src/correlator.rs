//! Matches inbound mail against the probes we sent.

use std::{net::IpAddr, sync::Arc};

use async_trait::async_trait;
use roundtrip_common::{incoming, status::Status, tracing};
use roundtrip_smtp::{Envelope, Reply, TransactionHandler};

use crate::{header::ProbeHeader, state::ProbeState};

/// Accepts mail for the accept address and completes matching probes.
///
/// Mail for anyone else is refused. Mail for us is always accepted, probe or
/// not, matched or not.
pub struct Correlator {
    state: Arc<ProbeState>,
    accept_address: String,
}

impl Correlator {
    pub const fn new(state: Arc<ProbeState>, accept_address: String) -> Self {
        Self {
            state,
            accept_address,
        }
    }

    /// Handle one inbound message.
    pub fn correlate(&self, peer: IpAddr, recipients: &[String], message: &[u8]) -> Reply {
        if !recipients.iter().any(|rcpt| *rcpt == self.accept_address) {
            tracing::debug!(%peer, ?recipients, "Refusing mail not addressed to us");
            return Reply::new(Status::Error, "Recipient not accepted here");
        }

        let now = self.state.touch();

        let Some(header) = ProbeHeader::find(message) else {
            tracing::debug!(%peer, "Accepted mail without a probe header");
            return Reply::ok();
        };

        let duration = header.round_trip(now);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Unix seconds fit comfortably in an i64"
        )]
        let received_at = now.floor() as i64;

        match self
            .state
            .complete(&header.id, received_at, duration, peer.to_string())
        {
            Some(_) => incoming!(
                level = INFO,
                probe_id = %header.id,
                %peer,
                duration,
                "Got round trip probe via {peer}, sent {duration} seconds ago"
            ),
            None => tracing::debug!(
                probe_id = %header.id,
                %peer,
                "Probe does not match any pending record, ignoring"
            ),
        }

        Reply::ok()
    }
}

#[async_trait]
impl TransactionHandler for Correlator {
    async fn handle_message(&self, envelope: &Envelope) -> Reply {
        self.correlate(envelope.peer().ip(), envelope.recipients(), envelope.data())
    }
}
