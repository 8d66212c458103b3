use std::net::SocketAddr;

/// One completed mail transaction, as handed to a [`TransactionHandler`].
///
/// [`TransactionHandler`]: crate::transaction_handler::TransactionHandler
#[derive(Debug, Clone)]
pub struct Envelope {
    peer: SocketAddr,
    sender: Option<String>,
    recipients: Vec<String>,
    data: Vec<u8>,
}

impl Envelope {
    #[must_use]
    pub const fn new(
        peer: SocketAddr,
        sender: Option<String>,
        recipients: Vec<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            peer,
            sender,
            recipients,
            data,
        }
    }

    /// Address of the client that delivered this message
    #[inline]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Envelope sender, `None` for the null reverse-path
    #[inline]
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Every recipient accepted during `RCPT TO`
    #[inline]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Raw message bytes with the transparency dots removed
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
