//! Business logic seam for the SMTP receiver.
//!
//! The session owns the protocol (greeting, envelope commands, DATA framing);
//! what happens to a finished message is decided by a [`TransactionHandler`].

use std::borrow::Cow;

use async_trait::async_trait;
use roundtrip_common::status::Status;

use crate::envelope::Envelope;

/// Reply sent back to the client once a message has been handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub message: Cow<'static, str>,
}

impl Reply {
    #[must_use]
    pub fn new(status: Status, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// `250 OK`
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            status: Status::Ok,
            message: Cow::Borrowed("OK"),
        }
    }

    /// The reply formatted as a single SMTP response line, without CRLF.
    #[must_use]
    pub fn line(&self) -> String {
        format!("{} {}", self.status, self.message)
    }
}

/// Decides the fate of a fully received message.
///
/// Called once per transaction after the terminating `.`. Implementations
/// must not hold the session hostage: anything slow belongs in a background
/// task.
#[async_trait]
pub trait TransactionHandler: Send + Sync {
    async fn handle_message(&self, envelope: &Envelope) -> Reply;
}

/// Accepts everything and discards it.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

#[async_trait]
impl TransactionHandler for AcceptAll {
    async fn handle_message(&self, _envelope: &Envelope) -> Reply {
        Reply::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_line() {
        assert_eq!(Reply::ok().line(), "250 OK");
        assert_eq!(
            Reply::new(Status::Error, "Not for me").line(),
            "550 Not for me"
        );
    }

    #[tokio::test]
    async fn accept_all_accepts() {
        let envelope = Envelope::new(
            "127.0.0.1:2525".parse().expect("valid address"),
            None,
            vec!["someone@example.org".to_string()],
            b"Subject: hi\r\n\r\nbody\r\n".to_vec(),
        );
        assert_eq!(AcceptAll.handle_message(&envelope).await, Reply::ok());
    }
}
