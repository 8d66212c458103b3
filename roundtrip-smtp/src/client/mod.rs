//! Minimal SMTP client used to hand probe messages to a mail exchanger.
//!
//! Plain TCP only. The client speaks just enough ESMTP to deliver a single
//! message:
//!
//! ```no_run
//! use roundtrip_smtp::client::{MessageBuilder, SmtpClient};
//!
//! # async fn example() -> Result<(), roundtrip_smtp::client::ClientError> {
//! let mut client = SmtpClient::connect("mx.example.org:25").await?;
//! client.read_greeting().await?;
//! client.ehlo("monitor.example.org").await?;
//! client.mail_from("roundtrip@example.org").await?;
//! client.rcpt_to("echo@example.net").await?;
//! client.data().await?;
//!
//! let message = MessageBuilder::new()
//!     .from("roundtrip@example.org")
//!     .to("echo@example.net")
//!     .subject("Hello")
//!     .body("Sent via roundtrip")
//!     .build();
//! client.send_data(&message).await?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod message;
mod response;
mod smtp_client;

pub use error::{ClientError, Result};
pub use message::MessageBuilder;
pub use response::Response;
pub use smtp_client::SmtpClient;
