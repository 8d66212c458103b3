//! Monitoring endpoints for the round trip monitor.
//!
//! # Endpoints
//!
//! - **`/simple`** - `seconds:<n>`, whole seconds since mail for the accept
//!   address was last received. Meant for external alerting.
//! - **`/detailed`** - HTML table of the most recent probes with their round
//!   trip times and the average.

mod config;
mod error;
mod server;

pub use config::HttpConfig;
pub use error::HttpError;
pub use server::{MonitorServer, MonitorState};
