//! Incremental Memcached Command Parser
//!
//! The parser lifts one command at a time off a byte buffer filled from the
//! socket. It is incremental: partial input is never an error, the caller
//! simply reads more bytes and tries again.
//!
//! ## How the Parser Works
//!
//! [`parse_command`] reads from a buffer and returns either:
//! - `Ok(Some((parsed, consumed)))` - a complete unit, `consumed` bytes were used
//! - `Ok(None)` - need more data, the command is incomplete
//! - `Err(ParseError)` - command framing is lost and the connection must close
//!
//! This design allows the caller to:
//! 1. Append incoming network data to a buffer
//! 2. Call `parse_command()` to attempt parsing
//! 3. If successful, advance the buffer by `consumed` bytes
//! 4. If incomplete, wait for more data
//!
//! ## Malformed lines are data, not errors
//!
//! A line the server cannot understand still has a well-defined protocol
//! answer: one `ERROR` line, after which the connection keeps reading. The
//! parser therefore returns such lines as [`Parsed::Malformed`] together
//! with the bytes to consume, instead of failing the stream. The only hard
//! error is a storage payload whose declared byte count is consumed but
//! whose terminator is not CRLF - at that point the command boundary is
//! unrecoverable and the connection has to be dropped.
//!
//! ## noreply on broken lines
//!
//! A client that appends `noreply` has declared it will not read a response,
//! so even the `ERROR` answer must be suppressed. The parser detects the
//! trailing `noreply` token on lines it otherwise rejects and reports it in
//! [`Parsed::Malformed`], so the response path can stay silent.

use crate::protocol::types::{Command, StoreCommand, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// One complete unit lifted off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// A well-formed command.
    Command(Command),
    /// A command line the server could not make sense of. The protocol
    /// answer is one `ERROR` line, unless the client asked for silence
    /// with a trailing `noreply`.
    Malformed { reason: RejectReason, noreply: bool },
}

/// Errors that make the command stream unrecoverable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A storage payload did not end with CRLF where the declared byte
    /// count said it would. The stream has no command boundary anymore.
    #[error("payload of {declared} bytes not terminated by CRLF")]
    UnterminatedPayload { declared: usize, noreply: bool },
}

impl ParseError {
    /// Whether the offending command asked for response suppression.
    pub fn noreply(&self) -> bool {
        match self {
            ParseError::UnterminatedPayload { noreply, .. } => *noreply,
        }
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Why a command line was rejected.
///
/// These never terminate the connection; they surface as a single `ERROR`
/// line (or silence, under `noreply`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The command word is not one we serve.
    UnknownCommand,
    /// Too few or too many tokens for the command.
    BadArgumentCount,
    /// A numeric field (`flags`, `exptime`, `bytes`, legacy delete time)
    /// failed to parse.
    BadInteger,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::UnknownCommand => write!(f, "unknown command"),
            RejectReason::BadArgumentCount => write!(f, "bad argument count"),
            RejectReason::BadInteger => write!(f, "invalid numeric field"),
        }
    }
}

/// Attempts to parse one command from the buffer.
///
/// # Returns
///
/// - `Ok(Some((parsed, consumed)))` - one complete unit was framed
/// - `Ok(None)` - incomplete data, need more bytes
/// - `Err(e)` - the stream can no longer be resynchronized
pub fn parse_command(buf: &[u8]) -> ParseResult<Option<(Parsed, usize)>> {
    let line_end = match find_crlf(buf) {
        Some(pos) => pos,
        None => return Ok(None),
    };
    let line = &buf[..line_end];
    let line_consumed = line_end + CRLF.len();

    let tokens = tokenize(line);
    if tokens.is_empty() {
        // A bare CRLF; answer ERROR like any other unintelligible line.
        return Ok(Some((reject(RejectReason::UnknownCommand, false), line_consumed)));
    }

    match tokens[0] {
        b"set" => parse_store(buf, &tokens, line_consumed, Command::Set),
        b"add" => parse_store(buf, &tokens, line_consumed, Command::Add),
        b"delete" => Ok(Some((parse_delete(&tokens), line_consumed))),
        b"get" => Ok(Some((parse_get(&tokens), line_consumed))),
        b"version" => Ok(Some((parse_bare(&tokens, Command::Version), line_consumed))),
        b"quit" => Ok(Some((parse_bare(&tokens, Command::Quit), line_consumed))),
        _ => Ok(Some((
            reject(RejectReason::UnknownCommand, trailing_noreply(&tokens)),
            line_consumed,
        ))),
    }
}

/// Parses `set`/`add`: `<cmd> <key> <flags> <exptime> <bytes> [noreply]`
/// followed by the payload and its CRLF terminator.
fn parse_store(
    buf: &[u8],
    tokens: &[&[u8]],
    line_consumed: usize,
    build: fn(StoreCommand) -> Command,
) -> ParseResult<Option<(Parsed, usize)>> {
    let noreply = tokens.len() == 6 && tokens[5] == b"noreply";
    if tokens.len() != 5 && !(tokens.len() == 6 && noreply) {
        return Ok(Some((
            reject(RejectReason::BadArgumentCount, trailing_noreply(tokens)),
            line_consumed,
        )));
    }

    // A bad numeric field means the declared payload length is unknown, so
    // only the header line can be consumed here. The payload bytes behind it
    // will be read as command lines and each answered ERROR, which is what
    // stock memcached does too.
    let (flags, exptime, declared) = match (
        parse_int::<u32>(tokens[2]),
        parse_int::<i64>(tokens[3]),
        parse_int::<usize>(tokens[4]),
    ) {
        (Some(f), Some(e), Some(b)) => (f, e, b),
        _ => {
            return Ok(Some((
                reject(RejectReason::BadInteger, noreply),
                line_consumed,
            )))
        }
    };

    let data_end = line_consumed + declared;
    let total = data_end + CRLF.len();
    if buf.len() < total {
        return Ok(None);
    }
    if &buf[data_end..total] != CRLF {
        return Err(ParseError::UnterminatedPayload { declared, noreply });
    }

    let command = build(StoreCommand {
        key: Bytes::copy_from_slice(tokens[1]),
        flags,
        exptime,
        data: Bytes::copy_from_slice(&buf[line_consumed..data_end]),
        noreply,
    });
    Ok(Some((Parsed::Command(command), total)))
}

/// Parses `delete <key> [<time>] [noreply]`.
///
/// The numeric hold-off time is a deprecated leftover of the old protocol:
/// it must still parse as an integer, and it has no effect.
fn parse_delete(tokens: &[&[u8]]) -> Parsed {
    let noreply = tokens.len() >= 3 && *tokens.last().unwrap() == b"noreply";
    let args = &tokens[1..tokens.len() - usize::from(noreply)];

    match args {
        [key] => Parsed::Command(Command::Delete {
            key: Bytes::copy_from_slice(key),
            noreply,
        }),
        [key, legacy_time] => match parse_int::<i64>(legacy_time) {
            Some(_) => Parsed::Command(Command::Delete {
                key: Bytes::copy_from_slice(key),
                noreply,
            }),
            None => reject(RejectReason::BadInteger, noreply),
        },
        _ => reject(RejectReason::BadArgumentCount, noreply),
    }
}

/// Parses `get <key> [<key> ...]`.
fn parse_get(tokens: &[&[u8]]) -> Parsed {
    if tokens.len() < 2 {
        return reject(RejectReason::BadArgumentCount, false);
    }
    let keys = tokens[1..]
        .iter()
        .map(|k| Bytes::copy_from_slice(k))
        .collect();
    Parsed::Command(Command::Get { keys })
}

/// Parses the argument-less commands (`version`, `quit`).
fn parse_bare(tokens: &[&[u8]], command: Command) -> Parsed {
    if tokens.len() == 1 {
        Parsed::Command(command)
    } else {
        reject(RejectReason::BadArgumentCount, trailing_noreply(tokens))
    }
}

fn reject(reason: RejectReason, noreply: bool) -> Parsed {
    Parsed::Malformed { reason, noreply }
}

/// Splits a command line into space-separated tokens, byte-wise so that
/// keys stay binary-safe.
fn tokenize(line: &[u8]) -> Vec<&[u8]> {
    line.split(|&b| b == b' ').filter(|t| !t.is_empty()).collect()
}

fn trailing_noreply(tokens: &[&[u8]]) -> bool {
    tokens.last() == Some(&&b"noreply"[..])
}

fn parse_int<T: std::str::FromStr>(token: &[u8]) -> Option<T> {
    std::str::from_utf8(token).ok()?.parse().ok()
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}
