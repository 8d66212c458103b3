//! The one piece of mutable state shared by the emitter, the correlator and
//! the reporter.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;

use crate::{
    clock::{Clock, SystemClock},
    record::ProbeRecord,
    store::ProbeStore,
};

/// Probe history plus the time inbound mail was last seen.
///
/// The store lock is only ever held for synchronous work; nothing awaits
/// while holding it.
pub struct ProbeState {
    store: Mutex<ProbeStore>,
    /// `f64` unix seconds stored as bits
    last_received: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ProbeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeState")
            .field("records", &self.store.lock().len())
            .field("last_received", &self.last_received())
            .finish_non_exhaustive()
    }
}

impl Default for ProbeState {
    fn default() -> Self {
        Self::new(crate::store::DEFAULT_CAPACITY, Arc::new(SystemClock))
    }
}

impl ProbeState {
    /// Liveness starts at the current time of `clock`.
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            store: Mutex::new(ProbeStore::new(capacity)),
            last_received: AtomicU64::new(started.to_bits()),
            clock,
        }
    }

    #[inline]
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn append(&self, record: ProbeRecord) {
        self.store.lock().append(record);
    }

    /// Complete the newest pending record with this id.
    ///
    /// Returns the updated record, or `None` when no pending record matched.
    pub fn complete(
        &self,
        id: &str,
        received_at: i64,
        duration: f64,
        peer: String,
    ) -> Option<ProbeRecord> {
        let mut store = self.store.lock();
        let record = store.find_latest_pending(id)?;
        record.mark_completed(received_at, duration, peer);
        Some(record.clone())
    }

    /// Attach a dispatch error to the newest record with this id.
    ///
    /// Returns the updated record, or `None` if it is no longer retained.
    pub fn set_error(&self, id: &str, error: String) -> Option<ProbeRecord> {
        let mut store = self.store.lock();
        let record = store.find_latest_mut(id)?;
        record.mark_failed(error);
        Some(record.clone())
    }

    /// The exchanger accepted the newest record with this id.
    ///
    /// Returns the updated record, or `None` if it is no longer retained.
    pub fn mark_sent(&self, id: &str) -> Option<ProbeRecord> {
        let mut store = self.store.lock();
        let record = store.find_latest_mut(id)?;
        record.sending = false;
        Some(record.clone())
    }

    /// A copy of the newest record with this id.
    pub fn get(&self, id: &str) -> Option<ProbeRecord> {
        self.store.lock().find_latest(id).cloned()
    }

    pub fn snapshot_recent(&self, n: usize) -> Vec<ProbeRecord> {
        self.store.lock().snapshot_recent(n)
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Record that inbound mail for us just arrived.
    pub fn touch(&self) -> f64 {
        let now = self.now();
        self.last_received.store(now.to_bits(), Ordering::Release);
        now
    }

    pub fn last_received(&self) -> f64 {
        f64::from_bits(self.last_received.load(Ordering::Acquire))
    }

    /// Whole seconds since inbound mail was last seen, never negative.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Clamped to zero and truncated towards zero on purpose"
    )]
    pub fn seconds_since_last_received(&self) -> u64 {
        (self.now() - self.last_received()).max(0.0) as u64
    }
}
