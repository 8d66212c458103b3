//! Plain text message builder.

use std::fmt::Write;

/// Builder for a single-part text message.
///
/// Headers are emitted in the order they were added, after `From`, `To` and
/// `Subject`.
///
/// ```
/// use roundtrip_smtp::client::MessageBuilder;
///
/// let message = MessageBuilder::new()
///     .from("sender@example.com")
///     .to("recipient@example.com")
///     .subject("Hello")
///     .header("X-Trace", "abc")
///     .body("This is the message body")
///     .build();
///
/// assert!(message.starts_with("From: sender@example.com\r\n"));
/// assert!(message.ends_with("\r\n\r\nThis is the message body\r\n"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    subject: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl MessageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from(mut self, email: impl Into<String>) -> Self {
        self.from = Some(email.into());
        self
    }

    /// Adds a recipient to the To header.
    #[must_use]
    pub fn to(mut self, email: impl Into<String>) -> Self {
        self.to.push(email.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Adds a custom header. Repeated names are kept, in order.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, content: impl Into<String>) -> Self {
        self.body = Some(content.into());
        self
    }

    /// Render the message with CRLF line endings.
    #[must_use]
    pub fn build(self) -> String {
        let mut message = String::with_capacity(512);

        // Writing into a String cannot fail
        if let Some(from) = &self.from {
            let _ = write!(message, "From: {from}\r\n");
        }

        if !self.to.is_empty() {
            let _ = write!(message, "To: {}\r\n", self.to.join(", "));
        }

        if let Some(subject) = &self.subject {
            let _ = write!(message, "Subject: {subject}\r\n");
        }

        for (name, value) in &self.headers {
            let _ = write!(message, "{name}: {value}\r\n");
        }

        message.push_str("\r\n");

        if let Some(body) = &self.body {
            for line in body.lines() {
                message.push_str(line);
                message.push_str("\r\n");
            }
        }

        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_keep_insertion_order() {
        let message = MessageBuilder::new()
            .from("a@example.org")
            .to("b@example.org")
            .to("c@example.org")
            .subject("Hi")
            .header("Date", "Thu, 1 Jan 1970 00:00:00 +0000")
            .header("Message-ID", "<1@example.org>")
            .body("line one\nline two")
            .build();

        assert_eq!(
            message,
            "From: a@example.org\r\n\
             To: b@example.org, c@example.org\r\n\
             Subject: Hi\r\n\
             Date: Thu, 1 Jan 1970 00:00:00 +0000\r\n\
             Message-ID: <1@example.org>\r\n\
             \r\n\
             line one\r\n\
             line two\r\n"
        );
    }

    #[test]
    fn empty_message_has_header_separator() {
        assert_eq!(MessageBuilder::new().build(), "\r\n");
    }
}
