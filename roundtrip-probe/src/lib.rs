//! Probe emission, correlation and reporting for the round trip monitor.
//!
//! This crate provides:
//! - [`Emitter`]: sends a uniquely identified probe towards the target on
//!   a fixed interval
//! - [`Correlator`]: matches inbound messages to the probes they came from
//! - [`Reporter`]: liveness and per-probe round trip views
//! - [`ProbeState`]: the bounded, in-memory history shared by all three
//! - DNS MX and PTR resolution for exchangers and receiving peers

pub mod clock;
mod config;
mod correlator;
mod dns;
mod emitter;
mod error;
mod header;
mod record;
mod report;
mod smtp_transaction;
mod state;
mod store;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ProbeConfig;
pub use correlator::Correlator;
// Re-export DNS types
pub use dns::{DnsConfig, DnsError, DnsResolver, MxResolver, PeerResolver, StaticResolver};
pub use emitter::{Emitter, PROBE_BODY};
// Re-export error types
pub use error::{ConfigError, DispatchError};
pub use header::{PROBE_HEADER, ProbeHeader};
pub use record::ProbeRecord;
pub use report::{
    DEFAULT_DETAIL_ROWS, DEFAULT_LOOKUP_TIMEOUT, DetailReport, DetailRow, Received, Reporter,
    RowClass, UNKNOWN_EXCHANGER, average_duration,
};
pub use smtp_transaction::SmtpTransport;
pub use state::ProbeState;
pub use store::{DEFAULT_CAPACITY, ProbeStore};
pub use transport::{OutboundProbe, ProbeTransport};
