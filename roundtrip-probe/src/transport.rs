use async_trait::async_trait;

use crate::error::DispatchError;

/// A fully built probe message and where to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundProbe {
    /// Exchanger hostname or address
    pub exchanger: String,
    pub port: u16,
    /// Envelope sender, also the address probes come back to
    pub sender: String,
    pub recipient: String,
    /// RFC 5322 message text
    pub message: String,
}

impl OutboundProbe {
    /// `host:port`, with IPv6 literals bracketed.
    pub fn server(&self) -> String {
        if self.exchanger.contains(':') {
            format!("[{}]:{}", self.exchanger, self.port)
        } else {
            format!("{}:{}", self.exchanger, self.port)
        }
    }
}

/// Hands a probe to the mail system.
///
/// Implementations bound their own run time; the emitter treats any error,
/// including a timeout, as a dispatch failure.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn send(&self, probe: &OutboundProbe) -> Result<(), DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(exchanger: &str) -> OutboundProbe {
        OutboundProbe {
            exchanger: exchanger.to_string(),
            port: 25,
            sender: "a@example.org".to_string(),
            recipient: "b@example.org".to_string(),
            message: String::new(),
        }
    }

    #[test]
    fn server_address() {
        assert_eq!(probe("mx.example.org").server(), "mx.example.org:25");
        assert_eq!(probe("192.0.2.1").server(), "192.0.2.1:25");
        assert_eq!(probe("2001:db8::1").server(), "[2001:db8::1]:25");
    }
}
