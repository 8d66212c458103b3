use serde::Serialize;

/// One dispatched probe and, once it comes back, its round trip result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeRecord {
    pub id: String,
    /// Unix seconds captured before dispatch
    pub sent_at: i64,
    /// Unix seconds the probe came back, `None` while pending
    pub received_at: Option<i64>,
    /// Round trip in seconds, millisecond precision
    pub duration: Option<f64>,
    /// Why dispatch failed, if it did
    pub error: Option<String>,
    /// Address of the peer that delivered the probe back to us
    pub receiving_peer: Option<String>,
    /// Exchanger the probe was handed to
    pub via_mx: Option<String>,
    /// Still being handed to the exchanger
    pub sending: bool,
}

impl ProbeRecord {
    /// A probe that was accepted by the exchanger and is waiting to come back.
    #[must_use]
    pub const fn pending(id: String, sent_at: i64, via_mx: Option<String>) -> Self {
        Self {
            id,
            sent_at,
            received_at: None,
            duration: None,
            error: None,
            receiving_peer: None,
            via_mx,
            sending: false,
        }
    }

    /// A probe registered before it is handed to the exchanger.
    #[must_use]
    pub fn sending(id: String, sent_at: i64, via_mx: Option<String>) -> Self {
        Self {
            sending: true,
            ..Self::pending(id, sent_at, via_mx)
        }
    }

    /// A probe that never left, with the reason it failed.
    #[must_use]
    pub fn failed(id: String, sent_at: i64, via_mx: Option<String>, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::pending(id, sent_at, via_mx)
        }
    }

    #[inline]
    pub const fn is_completed(&self) -> bool {
        self.received_at.is_some()
    }

    #[inline]
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Handed to the exchanger and not yet back or failed.
    #[inline]
    pub const fn is_sending(&self) -> bool {
        self.sending && !self.is_completed() && !self.is_failed()
    }

    /// Attach the dispatch error, ending the hand-off.
    pub fn mark_failed(&mut self, error: String) {
        self.error = Some(error);
        self.sending = false;
    }

    /// Fill in the round trip result.
    pub fn mark_completed(&mut self, received_at: i64, duration: f64, peer: String) {
        self.received_at = Some(received_at);
        self.duration = Some(duration);
        self.receiving_peer = Some(peer);
        self.sending = false;
    }
}
