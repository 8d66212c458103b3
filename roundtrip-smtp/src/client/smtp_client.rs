//! Plain TCP SMTP client.

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpStream, ToSocketAddrs},
};

use roundtrip_common::{incoming, outgoing, tracing};

use super::error::{ClientError, Result};
use super::response::Response;

/// Longest reply line accepted from a server.
const MAX_LINE_LENGTH: u64 = 4096;

/// Most lines accepted in one multi-line reply.
const MAX_RESPONSE_LINES: usize = 128;

/// An SMTP client for sending commands and receiving responses.
pub struct SmtpClient {
    stream: BufReader<TcpStream>,
    responses: Vec<Response>,
}

impl SmtpClient {
    /// Connect to the given address.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;

        Ok(Self {
            stream: BufReader::new(stream),
            responses: Vec::new(),
        })
    }

    /// Reads the initial server greeting (220 response).
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the greeting is invalid.
    pub async fn read_greeting(&mut self) -> Result<Response> {
        self.read_response().await
    }

    /// Sends a command to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails.
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        outgoing!("{command}");
        let stream = self.stream.get_mut();
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        Ok(())
    }

    /// Sends a raw command and reads the response.
    ///
    /// # Errors
    ///
    /// Returns an error if sending or reading fails.
    pub async fn command(&mut self, command: &str) -> Result<Response> {
        self.send_command(command).await?;
        self.read_response().await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn ehlo(&mut self, domain: &str) -> Result<Response> {
        self.command(&format!("EHLO {domain}")).await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn helo(&mut self, domain: &str) -> Result<Response> {
        self.command(&format!("HELO {domain}")).await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn mail_from(&mut self, from: &str) -> Result<Response> {
        self.command(&format!("MAIL FROM:<{from}>")).await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response> {
        self.command(&format!("RCPT TO:<{to}>")).await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn data(&mut self) -> Result<Response> {
        self.command("DATA").await
    }

    /// Sends the message body followed by the terminating dot.
    ///
    /// Line endings are normalised to CRLF and lines starting with `.` are
    /// dot-stuffed.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails.
    pub async fn send_data(&mut self, data: &str) -> Result<Response> {
        let encoded = encode_data(data);
        tracing::trace!(size = encoded.len(), "Sending message data");

        let stream = self.stream.get_mut();
        stream.write_all(encoded.as_bytes()).await?;
        stream.flush().await?;

        self.read_response().await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn quit(&mut self) -> Result<Response> {
        self.command("QUIT").await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rset(&mut self) -> Result<Response> {
        self.command("RSET").await
    }

    /// Returns all responses received so far.
    #[must_use]
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// Returns the last response received, if any.
    #[must_use]
    pub fn last_response(&self) -> Option<&Response> {
        self.responses.last()
    }

    /// Reads a complete, possibly multi-line, reply.
    async fn read_response(&mut self) -> Result<Response> {
        let mut code = None;
        let mut lines = Vec::new();

        loop {
            let mut raw = Vec::new();
            let read = (&mut self.stream)
                .take(MAX_LINE_LENGTH)
                .read_until(b'\n', &mut raw)
                .await?;
            if read == 0 {
                return Err(ClientError::ConnectionClosed);
            }

            let text = std::str::from_utf8(&raw)?;
            incoming!("{}", text.trim_end());
            let line = Response::parse_line(text)?;

            match code {
                Some(expected) if expected != line.code => {
                    return Err(ClientError::Malformed(format!(
                        "Status code mismatch in multi-line response: expected {expected}, got {}",
                        line.code
                    )));
                }
                Some(_) => {}
                None => code = Some(line.code),
            }

            lines.push(line.message);

            if line.is_last {
                break;
            }

            if lines.len() >= MAX_RESPONSE_LINES {
                return Err(ClientError::Malformed(format!(
                    "Response exceeds {MAX_RESPONSE_LINES} lines"
                )));
            }
        }

        let response = Response::new(code.unwrap_or_default(), lines);
        self.responses.push(response.clone());
        Ok(response)
    }
}

/// Dot-stuff the body, normalise line endings and append `.\r\n`.
fn encode_data(data: &str) -> String {
    let mut encoded = String::with_capacity(data.len() + 8);

    for line in data.lines() {
        if line.starts_with('.') {
            encoded.push('.');
        }
        encoded.push_str(line);
        encoded.push_str("\r\n");
    }

    encoded.push_str(".\r\n");
    encoded
}
