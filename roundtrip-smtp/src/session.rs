use std::{net::SocketAddr, sync::Arc, time::Duration};

use roundtrip_common::{
    Signal,
    config::{ServerTimeouts, TimeoutConfig},
    error::SessionError,
    incoming, internal, outgoing,
    status::Status,
    tracing,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{
    command::Command,
    envelope::Envelope,
    transaction_handler::{Reply, TransactionHandler},
};

/// Longest line read in one go. Longer lines are split and reassembled.
const MAX_LINE_LENGTH: u64 = 4096;

#[derive(Debug)]
pub struct SessionConfig {
    pub banner: Arc<str>,
    /// Maximum message size in bytes, 0 disables the check
    pub max_message_size: usize,
    pub timeouts: ServerTimeouts,
}

#[derive(Debug, PartialEq, Eq)]
enum Phase {
    Connected,
    Greeted,
    Mail {
        sender: Option<String>,
        recipients: Vec<String>,
    },
}

pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send> {
    stream: BufReader<Stream>,
    peer: SocketAddr,
    config: Arc<SessionConfig>,
    handler: Arc<dyn TransactionHandler>,
    phase: Phase,
    start_time: std::time::Instant,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Session<Stream> {
    pub fn new(
        stream: Stream,
        peer: SocketAddr,
        config: Arc<SessionConfig>,
        handler: Arc<dyn TransactionHandler>,
    ) -> Self {
        Self {
            stream: BufReader::new(stream),
            peer,
            config,
            handler,
            phase: Phase::Connected,
            start_time: std::time::Instant::now(),
        }
    }

    /// Drive the conversation until the client quits, disconnects, times out
    /// or the process shuts down.
    ///
    /// # Errors
    /// Returns `SessionError` on I/O failure or when a timeout elapses.
    pub async fn run(
        mut self,
        mut signal: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), SessionError> {
        internal!(peer = %self.peer, "Connected");

        self.send(&format!("{} {} ESMTP", Status::ServiceReady, self.config.banner))
            .await?;

        loop {
            if self.start_time.elapsed() >= self.config.timeouts.connection_timeout() {
                tracing::warn!(
                    peer = %self.peer,
                    max_secs = self.config.timeouts.connection_secs,
                    "Connection exceeded maximum lifetime, closing"
                );
                self.send(&format!("{} Connection time limit exceeded", Status::Unavailable))
                    .await?;
                return Err(SessionError::Timeout(self.config.timeouts.connection_secs));
            }

            let timeout = self.config.timeouts.command_timeout();
            let received = tokio::select! {
                _ = signal.recv() => None,
                line = self.read_line(timeout) => Some(line),
            };

            let Some(line) = received else {
                self.send(&format!("{} Server shutting down", Status::Unavailable))
                    .await?;
                return Ok(());
            };

            let Some(line) = line? else {
                internal!(peer = %self.peer, "Connection closed by client");
                return Ok(());
            };

            let command = Command::parse(&line);
            incoming!("{command}");

            if !self.dispatch(command).await? {
                internal!(peer = %self.peer, "Connection closed");
                return Ok(());
            }
        }
    }

    /// Handle a single command. Returns `false` once the connection should close.
    async fn dispatch(&mut self, command: Command) -> Result<bool, SessionError> {
        let reply = match command {
            Command::Helo(id) => {
                self.phase = Phase::Greeted;
                format!("{} {} says hello to {id}", Status::Ok, self.config.banner)
            }
            Command::Ehlo(id) => {
                self.phase = Phase::Greeted;
                let mut lines = vec![format!("{} says hello to {id}", self.config.banner)];
                if self.config.max_message_size > 0 {
                    lines.push(format!("SIZE {}", self.config.max_message_size));
                }
                lines.push("8BITMIME".to_string());
                multiline(Status::Ok, &lines)
            }
            Command::MailFrom(sender) => match self.phase {
                Phase::Connected => {
                    format!("{} Send EHLO or HELO first", Status::InvalidCommandSequence)
                }
                Phase::Mail { .. } => {
                    format!("{} Sender already specified", Status::InvalidCommandSequence)
                }
                Phase::Greeted => {
                    self.phase = Phase::Mail {
                        sender,
                        recipients: Vec::new(),
                    };
                    Reply::ok().line()
                }
            },
            Command::RcptTo(recipient) => {
                if let Phase::Mail { recipients, .. } = &mut self.phase {
                    recipients.push(recipient);
                    Reply::ok().line()
                } else {
                    format!("{} Need MAIL before RCPT", Status::InvalidCommandSequence)
                }
            }
            Command::Data => match std::mem::replace(&mut self.phase, Phase::Greeted) {
                Phase::Mail { sender, recipients } if !recipients.is_empty() => {
                    self.transaction(sender, recipients).await?
                }
                other => {
                    self.phase = other;
                    format!("{} Need RCPT before DATA", Status::InvalidCommandSequence)
                }
            },
            Command::Rset => {
                if self.phase != Phase::Connected {
                    self.phase = Phase::Greeted;
                }
                Reply::ok().line()
            }
            Command::Noop => Reply::ok().line(),
            Command::Quit => {
                self.send(&format!("{} {} closing connection", Status::GoodBye, self.config.banner))
                    .await?;
                return Ok(false);
            }
            Command::Invalid(_) => {
                format!("{} Syntax error, command unrecognised", Status::SyntaxError)
            }
        };

        self.send(&reply).await?;
        Ok(true)
    }

    /// Receive the message body and hand the finished envelope to the handler.
    async fn transaction(
        &mut self,
        sender: Option<String>,
        recipients: Vec<String>,
    ) -> Result<String, SessionError> {
        self.send(&format!(
            "{} Start mail input; end with <CRLF>.<CRLF>",
            Status::StartMailInput
        ))
        .await?;

        let Some(data) = self.receive_data().await? else {
            return Ok(format!(
                "{} Message exceeds maximum size of {} bytes",
                Status::ExceededStorage,
                self.config.max_message_size
            ));
        };

        tracing::debug!(
            peer = %self.peer,
            size = data.len(),
            recipients = recipients.len(),
            "Message received"
        );

        let envelope = Envelope::new(self.peer, sender, recipients, data);
        Ok(self.handler.handle_message(&envelope).await.line())
    }

    /// Read message data up to the terminating dot, undoing dot-stuffing.
    ///
    /// Returns `None` when the message exceeded the configured size; the data
    /// is still consumed so the session stays in sync.
    async fn receive_data(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        let mut data = Vec::new();
        let mut oversized = false;
        let mut at_line_start = true;
        let timeout = self.config.timeouts.data_timeout();

        loop {
            let Some(chunk) = self.read_line(timeout).await? else {
                return Err(SessionError::Protocol(
                    "Connection closed during DATA".to_string(),
                ));
            };

            if at_line_start && (chunk == b".\r\n" || chunk == b".\n") {
                break;
            }

            let body = if at_line_start && chunk.starts_with(b"..") {
                &chunk[1..]
            } else {
                &chunk[..]
            };

            let limit = self.config.max_message_size;
            if limit > 0 && data.len().saturating_add(body.len()) > limit {
                oversized = true;
            }
            if !oversized {
                data.extend_from_slice(body);
            }

            at_line_start = chunk.ends_with(b"\n");
        }

        Ok((!oversized).then_some(data))
    }

    /// Read one line (or at most `MAX_LINE_LENGTH` bytes of it).
    ///
    /// `Ok(None)` signals the client closed the connection.
    async fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SessionError> {
        let mut line = Vec::new();
        let mut limited = (&mut self.stream).take(MAX_LINE_LENGTH);

        match tokio::time::timeout(timeout, limited.read_until(b'\n', &mut line)).await {
            Err(_) => {
                tracing::warn!(
                    peer = %self.peer,
                    timeout_secs = timeout.as_secs(),
                    "Client connection timed out"
                );
                Err(SessionError::Timeout(timeout.as_secs()))
            }
            Ok(Err(err)) => Err(err.into()),
            Ok(Ok(0)) => Ok(None),
            Ok(Ok(_)) => Ok(Some(line)),
        }
    }

    async fn send(&mut self, response: &str) -> Result<(), SessionError> {
        for line in response.lines() {
            outgoing!("{line}");
        }

        let stream = self.stream.get_mut();
        stream.write_all(response.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        Ok(())
    }
}

/// Format a multi-line reply, `250-first` ... `250 last`.
fn multiline(status: Status, lines: &[String]) -> String {
    let last = lines.len().saturating_sub(1);
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let separator = if index == last { ' ' } else { '-' };
            format!("{status}{separator}{line}")
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}
