//! Logplex frame reader
//!
//! A logplex body is a run of octet-counted syslog frames:
//!
//! ```text
//! 83 <190>1 2024-01-01T00:00:00+00:00 host app web.1 - request_id=req1 at=info
//! ^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^^^^^^^^^^
//! len          RFC 5424 header (6 fields)                   message body
//! ```

use nom::{
    bytes::complete::{take, take_till1},
    character::complete::{char, digit1, multispace0},
    combinator::{map_res, value},
    multi::count,
    sequence::{delimited, terminated},
    IResult,
};

use crate::transport::{TransportError, TransportResult};

/// Header fields preceding the message: PRI+version, timestamp, hostname,
/// app-name, procid, msgid
const HEADER_FIELDS: usize = 6;

fn length_prefix(input: &[u8]) -> IResult<&[u8], usize> {
    map_res(
        map_res(delimited(multispace0, digit1, char(' ')), std::str::from_utf8),
        str::parse::<usize>,
    )(input)
}

fn frame(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = length_prefix(input)?;
    take(len)(input)
}

fn header(input: &[u8]) -> IResult<&[u8], ()> {
    value(
        (),
        count(terminated(take_till1(|b: u8| b == b' '), char(' ')), HEADER_FIELDS),
    )(input)
}

/// Message body of one frame, header stripped
pub fn message_body(frame: &[u8]) -> TransportResult<&[u8]> {
    match header(frame) {
        Ok((body, ())) => Ok(body),
        Err(_) => Err(TransportError::Header(
            String::from_utf8_lossy(frame).into_owned(),
        )),
    }
}

/// Split a body into frame messages
///
/// A frame with a bad header is reported and skipped. A bad or overrunning
/// length prefix loses the framing, so it is reported and ends the read.
pub fn frames(body: &[u8]) -> Vec<TransportResult<&[u8]>> {
    let mut out = Vec::new();
    let mut input = body;

    loop {
        if input.iter().all(u8::is_ascii_whitespace) {
            break;
        }

        match frame(input) {
            Ok((rest, raw)) => {
                out.push(message_body(raw));
                input = rest;
            }
            Err(_) => {
                out.push(Err(TransportError::Framing {
                    offset: body.len() - input.len(),
                }));
                break;
            }
        }
    }

    out
}
