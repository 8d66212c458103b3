use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The server sent something that is not an SMTP reply.
    #[error("Malformed reply: {0}")]
    Malformed(String),

    /// A 4xx or 5xx reply where a positive one was required.
    #[error("Server replied {code} {message}")]
    Rejected { code: u16, message: String },

    #[error("Server closed the connection")]
    ConnectionClosed,

    #[error("Reply is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
