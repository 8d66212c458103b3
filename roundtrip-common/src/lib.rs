//! Shared plumbing for the round trip monitor: logging, SMTP reply codes,
//! timeout configuration and the shutdown signal.

pub mod config;
pub mod error;
pub mod logging;
pub mod status;

pub use tracing;

/// Name of this host as the OS reports it, `localhost` if it has none.
pub fn hostname() -> String {
    let name = gethostname::gethostname();
    let name = name.to_string_lossy();
    let name = name.trim();

    if name.is_empty() {
        "localhost".to_string()
    } else {
        name.to_string()
    }
}

/// Lifecycle signal broadcast to every long running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}

#[cfg(test)]
mod tests {
    #[test]
    fn hostname_comes_from_the_os() {
        let reported = gethostname::gethostname();
        let reported = reported.to_string_lossy();

        let name = super::hostname();
        assert!(!name.is_empty());
        if !reported.trim().is_empty() {
            assert_eq!(name, reported.trim());
        }
    }
}
