//! The IRCv3 line parser.
//!
//! Single pass over the line, slicing the original `&str` at field
//! boundaries found with `split_once`/`strip_prefix`. Nothing is copied
//! until the final `ParsedLine` is assembled; there is no intermediate
//! tokenizing buffer.

use crate::error::ParseError;
use crate::types::{ParsedLine, Tags};

/// Parses a single IRC line (no embedded CR/LF except an optional terminal
/// one, which the caller — the receive pump — has already stripped).
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    if line.is_empty() {
        return Err(ParseError::InvalidLine);
    }

    let (tags, rest) = match line.strip_prefix('@') {
        Some(body) => {
            let (tags_body, rest) = body.split_once(' ').ok_or(ParseError::InvalidLine)?;
            (Some(parse_tags(tags_body)), rest.trim_start_matches(' '))
        }
        None => (None, line),
    };

    let (prefix, rest) = match rest.strip_prefix(':') {
        Some(body) => {
            let (prefix, rest) = body.split_once(' ').ok_or(ParseError::InvalidLine)?;
            (Some(prefix.to_string()), rest.trim_start_matches(' '))
        }
        None => (None, rest),
    };

    let (command, params) = match rest.split_once(' ') {
        Some((command, params)) => (command, params.trim_start_matches(' ')),
        None => (rest, ""),
    };

    if command.is_empty() {
        return Err(ParseError::InvalidLine);
    }

    let (channel, trailing) = split_params(params);

    Ok(ParsedLine {
        tags,
        prefix,
        command: command.to_string(),
        channel,
        trailing,
    })
}

/// Scans a `key=value;key=value` tag body. Bare keys (no `=`) are dropped.
/// Empty values are kept.
fn parse_tags(body: &str) -> Tags {
    body.split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Splits the post-command parameter string into `(channel, trailing)`.
///
/// `trailing` starts right after the first ` :` (or, if the params begin
/// with `:`, right after that leading colon). `channel` is everything
/// before that marker, right-trimmed of spaces; absent if nothing but
/// spaces precedes the marker. If there is no trailing marker at all, the
/// entire (right-trimmed) param string is the channel.
fn split_params(params: &str) -> (Option<String>, Option<String>) {
    if params.is_empty() {
        return (None, None);
    }

    if let Some(trailing) = params.strip_prefix(':') {
        return (None, Some(trailing.to_string()));
    }

    match params.split_once(" :") {
        Some((channel_part, trailing)) => (
            non_empty(channel_part.trim_end_matches(' ')),
            Some(trailing.to_string()),
        ),
        None => (non_empty(params.trim_end_matches(' ')), None),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Reassembles a `ParsedLine` into canonical wire form, used only to test
/// the parser's round-trip property.
#[cfg(test)]
fn to_wire_line(parsed: &ParsedLine) -> String {
    let mut out = String::new();

    if let Some(tags) = &parsed.tags {
        out.push('@');
        let mut pairs: Vec<_> = tags.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        let body = pairs
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";");
        out.push_str(&body);
        out.push(' ');
    }

    if let Some(prefix) = &parsed.prefix {
        out.push(':');
        out.push_str(prefix);
        out.push(' ');
    }

    out.push_str(&parsed.command);

    if let Some(channel) = &parsed.channel {
        out.push(' ');
        out.push_str(channel);
    }

    if let Some(trailing) = &parsed.trailing {
        out.push_str(" :");
        out.push_str(trailing);
    }

    out
}
