use core::fmt::{self, Display, Formatter};

/// A single SMTP command line as sent by a client.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Command {
    Helo(String),
    Ehlo(String),
    /// `None` is the null reverse-path `<>` used by bounces.
    MailFrom(Option<String>),
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Quit,
    Invalid(String),
}

impl Command {
    /// Parse one command line, with or without the trailing CRLF.
    pub fn parse(line: &[u8]) -> Self {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, rest) = line
            .split_once(' ')
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

        match verb.to_ascii_uppercase().as_str() {
            "HELO" if !rest.is_empty() => Self::Helo(rest.to_string()),
            "EHLO" if !rest.is_empty() => Self::Ehlo(rest.to_string()),
            "MAIL" => strip_keyword(rest, "FROM:").map_or_else(
                || Self::Invalid(line.to_string()),
                |path| {
                    parse_path(path).map_or_else(
                        || Self::Invalid(line.to_string()),
                        |address| Self::MailFrom((!address.is_empty()).then_some(address)),
                    )
                },
            ),
            "RCPT" => strip_keyword(rest, "TO:")
                .and_then(parse_path)
                .filter(|address| !address.is_empty())
                .map_or_else(|| Self::Invalid(line.to_string()), Self::RcptTo),
            "DATA" => Self::Data,
            "RSET" => Self::Rset,
            "NOOP" => Self::Noop,
            "QUIT" => Self::Quit,
            _ => Self::Invalid(line.to_string()),
        }
    }
}

/// Case-insensitively strip `keyword` (e.g. `FROM:`) from the front of `input`.
fn strip_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let prefix = input.get(..keyword.len())?;
    prefix
        .eq_ignore_ascii_case(keyword)
        .then(|| input[keyword.len()..].trim_start())
}

/// Extract the mailbox from a `<path> [params]` argument, ignoring ESMTP
/// parameters. Bare addresses without brackets are tolerated.
fn parse_path(input: &str) -> Option<String> {
    let input = input.trim();

    if let Some(stripped) = input.strip_prefix('<') {
        let end = stripped.find('>')?;
        return Some(stripped[..end].trim().to_string());
    }

    input
        .split_whitespace()
        .next()
        .map(ToString::to_string)
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(id) => write!(fmt, "HELO {id}"),
            Self::Ehlo(id) => write!(fmt, "EHLO {id}"),
            Self::MailFrom(sender) => {
                write!(fmt, "MAIL FROM:<{}>", sender.as_deref().unwrap_or_default())
            }
            Self::RcptTo(recipient) => write!(fmt, "RCPT TO:<{recipient}>"),
            Self::Data => fmt.write_str("DATA"),
            Self::Rset => fmt.write_str("RSET"),
            Self::Noop => fmt.write_str("NOOP"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Invalid(line) => write!(fmt, "Invalid({line})"),
        }
    }
}
