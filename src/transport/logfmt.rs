//! logfmt pairs
//!
//! `key=value` pairs separated by whitespace. Values are bare (up to the next
//! whitespace) or double-quoted with backslash escapes. A key without `=` is
//! recorded with an empty value; a later duplicate replaces an earlier one.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_till, take_till1},
    character::complete::char,
    combinator::{cut, map, not, opt, value},
    sequence::{delimited, pair, preceded},
    IResult,
};
use std::collections::HashMap;

use crate::transport::{TransportError, TransportResult};

fn key(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c == '=' || c == '"' || c.is_whitespace())(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                is_not("\\\""),
                '\\',
                alt((
                    value("\\", tag("\\")),
                    value("\"", tag("\"")),
                    value("\n", tag("n")),
                    value("\t", tag("t")),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

fn bare(input: &str) -> IResult<&str, String> {
    map(
        preceded(not(char('"')), take_till(|c: char| c.is_whitespace())),
        str::to_string,
    )(input)
}

fn key_value(input: &str) -> IResult<&str, (&str, String)> {
    map(
        pair(key, opt(preceded(char('='), cut(alt((quoted, bare)))))),
        |(k, v)| (k, v.unwrap_or_default()),
    )(input)
}

/// Parse every pair of one line
pub fn parse(line: &str) -> TransportResult<HashMap<String, String>> {
    let mut pairs = HashMap::new();
    let mut input = line.trim_start();

    while !input.is_empty() {
        let (rest, (k, v)) = key_value(input).map_err(|_| TransportError::Logfmt {
            line: line.to_string(),
            offset: line.len() - input.len(),
        })?;
        pairs.insert(k.to_string(), v);
        input = rest.trim_start();
    }

    Ok(pairs)
}
