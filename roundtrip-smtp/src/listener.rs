use std::{net::SocketAddr, sync::Arc};

use futures_util::future::join_all;
use tokio::{net::TcpListener, sync::broadcast::error::RecvError};

use roundtrip_common::{Signal, error::ListenerError, internal, tracing};

use crate::{
    SmtpConfig,
    session::{Session, SessionConfig},
    transaction_handler::TransactionHandler,
};

/// Accepts SMTP connections and runs a [`Session`] for each.
pub struct Listener {
    listener: TcpListener,
    config: Arc<SessionConfig>,
    handler: Arc<dyn TransactionHandler>,
}

impl Listener {
    /// Bind the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::BindFailed`] if the socket cannot be bound.
    pub async fn bind(
        config: &SmtpConfig,
        handler: Arc<dyn TransactionHandler>,
    ) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(config.listen_address)
            .await
            .map_err(|source| ListenerError::BindFailed {
                address: config.listen_address.to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            config: Arc::new(SessionConfig {
                banner: config.banner().into(),
                max_message_size: config.max_message_size,
                timeouts: config.timeouts.clone(),
            }),
            handler,
        })
    }

    /// The address actually bound, useful when listening on port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until a shutdown signal arrives, then wait for the
    /// running sessions to finish.
    ///
    /// # Errors
    ///
    /// Currently infallible once bound; accept failures are logged and the
    /// listener keeps going.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), ListenerError> {
        let address = self.local_addr()?;
        internal!(level = INFO, "SMTP listener serving on {address}");

        let mut sessions = Vec::default();

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    if matches!(sig, Ok(Signal::Shutdown) | Err(RecvError::Closed)) {
                        internal!(
                            level = INFO,
                            "SMTP listener {address} received shutdown signal, finishing {} sessions ...",
                            sessions.len()
                        );
                        join_all(sessions).await;
                        break;
                    }
                }

                connection = self.listener.accept() => {
                    let (stream, peer) = match connection {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            tracing::warn!(error = %err, "Failed to accept connection");
                            continue;
                        }
                    };

                    tracing::debug!(%peer, "Connection received on {address}");
                    sessions.retain(|session: &tokio::task::JoinHandle<()>| !session.is_finished());

                    let session = Session::new(stream, peer, self.config.clone(), self.handler.clone());
                    let signal = shutdown.resubscribe();
                    sessions.push(tokio::spawn(async move {
                        if let Err(err) = session.run(signal).await {
                            if err.is_client_error() {
                                tracing::debug!(%peer, error = %err, "Session ended");
                            } else {
                                internal!(level = ERROR, "Session with {peer} failed: {err}");
                            }
                        }
                    }));
                }
            }
        }

        Ok(())
    }
}
