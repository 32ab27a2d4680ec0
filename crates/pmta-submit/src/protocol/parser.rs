//! Reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses a reply from its response lines.
///
/// Replies can be single-line or multi-line:
/// - Single: `250 ok id=Q1\r\n`
/// - Multi: `250-first line\r\n250-second line\r\n250 last line\r\n`
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the reply is malformed.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("Empty reply".into()));
    };

    let code_str = first
        .get(0..3)
        .ok_or_else(|| Error::Protocol(format!("Reply too short: {first}")))?;
    let code = code_str
        .parse::<u16>()
        .ok()
        .filter(|code| (100..600).contains(code))
        .ok_or_else(|| Error::Protocol(format!("Invalid reply code: {code_str}")))?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if line.get(0..3) != Some(code_str) {
            return Err(Error::Protocol(format!(
                "Reply code changed mid-reply: {line}"
            )));
        }
        match line.len() {
            3 => message.push(String::new()),
            _ => match line.get(4..) {
                Some(text) if matches!(line.as_bytes()[3], b' ' | b'-') => {
                    message.push(text.to_string());
                }
                _ => return Err(Error::Protocol(format!("Malformed reply line: {line}"))),
            },
        }
    }

    Ok(Reply::new(ReplyCode::new(code), message))
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Continuation lines use a `-` separator; the last line uses ` ` or ends
/// right after the code.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    match line.as_bytes() {
        [_, _, _] => true,
        [_, _, _, sep, ..] => *sep != b'-',
        _ => false,
    }
}
