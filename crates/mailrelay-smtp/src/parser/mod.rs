//! SMTP/LMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses the lines of one reply, CRLF already stripped.
///
/// Every line must start with the same three-digit code; continuation
/// lines use `-` after the code and the last one a space:
///
/// ```text
/// 250-mx.example.org
/// 250-SIZE 10240000
/// 250 STARTTLS
/// ```
///
/// # Errors
///
/// Returns [`Error::Protocol`] for an empty reply, a malformed code or a code
/// that changes between lines.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("Empty reply".into()));
    };
    let (code, _) = split_line(first)?;

    let message = lines
        .iter()
        .map(|line| match split_line(line)? {
            (c, text) if c == code => Ok(text.to_string()),
            _ => Err(Error::Protocol(format!("Reply code changed mid-reply: {line}"))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Reply::new(ReplyCode::new(code), message))
}

/// Returns true if `line` ends a reply (`250 text` or a bare `250`).
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    matches!(line.as_bytes(), [_, _, _] | [_, _, _, b' ', ..])
}

/// Splits a reply line into its code and text.
fn split_line(line: &str) -> Result<(u16, &str)> {
    let digits = line
        .get(..3)
        .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::Protocol(format!("Invalid reply code: {line}")))?;
    let code = digits
        .parse()
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {line}")))?;

    // The separator is ASCII, so slicing past it stays on a char boundary.
    let text = match line.as_bytes().get(3) {
        None => "",
        Some(b' ' | b'-') => &line[4..],
        Some(_) => return Err(Error::Protocol(format!("Malformed reply line: {line}"))),
    };
    Ok((code, text))
}
