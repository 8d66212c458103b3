//! SMTP response parsing and representation.

use super::error::{ClientError, Result};

/// A single parsed reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ResponseLine {
    pub code: u16,
    /// `false` for the `250-` continuation lines of a multi-line reply
    pub is_last: bool,
    pub message: String,
}

/// A complete SMTP response, which may span several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Response {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// The message text with lines joined by newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 400
    }

    #[must_use]
    pub const fn is_temporary_error(&self) -> bool {
        self.code >= 400 && self.code < 500
    }

    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code >= 500 && self.code < 600
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.is_temporary_error() || self.is_permanent_error()
    }

    /// Turn a 4xx/5xx reply into [`ClientError::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns the error variant when the reply is not positive.
    pub fn into_result(self) -> Result<Self> {
        if self.is_error() {
            Err(ClientError::Rejected {
                code: self.code,
                message: self.message(),
            })
        } else {
            Ok(self)
        }
    }

    /// Parses a single reply line, with or without its line ending.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Malformed` if the line doesn't match SMTP format.
    pub(super) fn parse_line(line: &str) -> Result<ResponseLine> {
        let line = line.trim_end_matches(['\r', '\n']);

        let code_str = line.get(..3).ok_or_else(|| {
            ClientError::Malformed(format!("Response line too short: '{line}'"))
        })?;
        let code = code_str
            .parse::<u16>()
            .map_err(|_| ClientError::Malformed(format!("Invalid status code: '{code_str}'")))?;

        let is_last = match line.as_bytes().get(3) {
            None | Some(b' ') => true,
            Some(b'-') => false,
            Some(&c) => {
                return Err(ClientError::Malformed(format!(
                    "Invalid separator character: '{}'",
                    char::from(c)
                )));
            }
        };

        Ok(ResponseLine {
            code,
            is_last,
            message: line.get(4..).unwrap_or_default().to_string(),
        })
    }
}
