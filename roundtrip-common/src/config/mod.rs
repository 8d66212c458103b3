//! Configuration types shared between the receiving and sending halves of
//! the monitor.
//!
//! - [`timeouts`]: timeout configuration for SMTP operations

pub mod timeouts;

pub use timeouts::{ClientTimeouts, ServerTimeouts, TimeoutConfig};
