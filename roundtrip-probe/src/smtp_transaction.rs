//! Delivers a probe over SMTP.
//!
//! One connection per probe: greeting, `EHLO`, `MAIL FROM`, `RCPT TO`,
//! `DATA`, message, `QUIT`. Each command is bounded by its own timeout and
//! the whole conversation by the send timeout.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use roundtrip_common::{config::ClientTimeouts, tracing};
use roundtrip_smtp::client::{ClientError, Response, SmtpClient};

use crate::{
    error::DispatchError,
    transport::{OutboundProbe, ProbeTransport},
};

/// [`ProbeTransport`] speaking plain SMTP to the chosen exchanger.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    helo_name: String,
    timeouts: ClientTimeouts,
    send_timeout: Duration,
}

impl SmtpTransport {
    #[must_use]
    pub const fn new(helo_name: String, timeouts: ClientTimeouts, send_timeout: Duration) -> Self {
        Self {
            helo_name,
            timeouts,
            send_timeout,
        }
    }

    /// Run one step of the conversation under its timeout and require a
    /// positive reply.
    async fn step(
        server: &str,
        stage: &'static str,
        timeout: Duration,
        command: impl Future<Output = Result<Response, ClientError>> + Send,
    ) -> Result<Response, DispatchError> {
        let response = tokio::time::timeout(timeout, command)
            .await
            .map_err(|_| DispatchError::Timeout { stage, timeout })??;

        if response.is_error() {
            return Err(DispatchError::Rejected {
                server: server.to_string(),
                stage,
                code: response.code,
                message: response.message(),
            });
        }

        Ok(response)
    }

    async fn connect_and_greet(&self, server: &str) -> Result<SmtpClient, DispatchError> {
        let connect_timeout = Duration::from_secs(self.timeouts.connect_secs);
        let mut client = tokio::time::timeout(connect_timeout, SmtpClient::connect(server))
            .await
            .map_err(|_| DispatchError::Timeout {
                stage: "Connect",
                timeout: connect_timeout,
            })?
            .map_err(|source| DispatchError::Connect {
                server: server.to_string(),
                source,
            })?;

        Self::step(
            server,
            "Greeting",
            Duration::from_secs(self.timeouts.command_secs),
            client.read_greeting(),
        )
        .await?;

        Ok(client)
    }

    async fn transaction(&self, probe: &OutboundProbe) -> Result<(), DispatchError> {
        let server = probe.server();
        let command_timeout = Duration::from_secs(self.timeouts.command_secs);

        let mut client = self.connect_and_greet(&server).await?;

        Self::step(&server, "EHLO", command_timeout, client.ehlo(&self.helo_name)).await?;
        Self::step(
            &server,
            "MAIL FROM",
            command_timeout,
            client.mail_from(&probe.sender),
        )
        .await?;
        Self::step(
            &server,
            "RCPT TO",
            command_timeout,
            client.rcpt_to(&probe.recipient),
        )
        .await?;
        Self::step(&server, "DATA", command_timeout, client.data()).await?;
        Self::step(
            &server,
            "Message",
            Duration::from_secs(self.timeouts.data_secs),
            client.send_data(&probe.message),
        )
        .await?;

        // The probe is already accepted, a failed QUIT does not matter
        let quit_timeout = Duration::from_secs(self.timeouts.quit_secs);
        match tokio::time::timeout(quit_timeout, client.quit()).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                tracing::warn!(server = %server, "QUIT failed after successful send: {err}");
            }
            Err(_) => {
                tracing::warn!(server = %server, timeout = ?quit_timeout, "QUIT timed out after successful send");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ProbeTransport for SmtpTransport {
    async fn send(&self, probe: &OutboundProbe) -> Result<(), DispatchError> {
        tokio::time::timeout(self.send_timeout, self.transaction(probe))
            .await
            .map_err(|_| DispatchError::Timeout {
                stage: "Probe send",
                timeout: self.send_timeout,
            })?
    }
}
