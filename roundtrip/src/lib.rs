//! Round trip mail delivery latency monitor.
//!
//! Sends a uniquely identified probe message to a target address every
//! interval, accepts the copies that come back over SMTP, and reports how
//! long each took over HTTP. See [`controller::RoundTrip`] for how the
//! pieces are wired together.

pub mod controller;

pub use controller::{RoundTrip, Running, SHUTDOWN_BROADCAST};
