//! Memcached Text Protocol Types
//!
//! This module defines the request and response model for the memcached
//! text protocol. Requests are single CRLF-terminated lines of
//! space-separated tokens; storage commands are followed by a raw payload
//! of a declared length, also CRLF-terminated.
//!
//! ## Request lines
//!
//! ```text
//! set <key> <flags> <exptime> <bytes> [noreply]\r\n<payload>\r\n
//! add <key> <flags> <exptime> <bytes> [noreply]\r\n<payload>\r\n
//! delete <key> [<time>] [noreply]\r\n
//! get <key> [<key> ...]\r\n
//! version\r\n
//! quit\r\n
//! ```
//!
//! ## Response lines
//!
//! ```text
//! STORED\r\n          set/add succeeded
//! NOT_STORED\r\n      add found the key already present
//! DELETED\r\n         delete removed the key
//! NOT_FOUND\r\n       delete found no such key
//! ERROR\r\n           the command line could not be understood
//! VALUE <key> <flags> <bytes>\r\n<payload>\r\nEND\r\n   get results
//! VERSION <version>\r\n
//! ```
//!
//! A command that carried `noreply` produces no response line at all.

use bytes::Bytes;

/// The line terminator used throughout the text protocol.
pub const CRLF: &[u8] = b"\r\n";

/// The arguments shared by the `set` and `add` storage commands.
///
/// `flags` and `exptime` are opaque to the mutation state machine: they are
/// stored with the entry and handed back on retrieval, nothing more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCommand {
    /// The key the payload is stored under.
    pub key: Bytes,
    /// Client-supplied metadata, returned verbatim by `get`.
    pub flags: u32,
    /// Expiration marker in memcached convention (see `storage::Entry::new`).
    pub exptime: i64,
    /// The payload, exactly as many bytes as the command line declared.
    pub data: Bytes,
    /// The client will not read a response for this command.
    pub noreply: bool,
}

/// A fully parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Unconditionally store the payload, overwriting any existing entry.
    Set(StoreCommand),
    /// Store the payload only if the key is currently absent.
    Add(StoreCommand),
    /// Remove the entry for `key` if present.
    Delete { key: Bytes, noreply: bool },
    /// Retrieve the entries for one or more keys.
    Get { keys: Vec<Bytes> },
    /// Report the server version.
    Version,
    /// Close the connection without a response.
    Quit,
}

impl Command {
    /// Returns whether the client asked for its response to be suppressed.
    pub fn noreply(&self) -> bool {
        match self {
            Command::Set(c) | Command::Add(c) => c.noreply,
            Command::Delete { noreply, .. } => *noreply,
            Command::Get { .. } | Command::Version => false,
            Command::Quit => true,
        }
    }

    /// The command word as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set(_) => "set",
            Command::Add(_) => "add",
            Command::Delete { .. } => "delete",
            Command::Get { .. } => "get",
            Command::Version => "version",
            Command::Quit => "quit",
        }
    }
}

/// One entry returned by a `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub key: Bytes,
    pub flags: u32,
    pub data: Bytes,
}

/// A response to send back to the client.
///
/// The four mutation outcomes map one-to-one onto the first four variants;
/// `Error` answers any command line the server could not make sense of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `STORED` - the payload was stored.
    Stored,
    /// `NOT_STORED` - `add` declined because the key already exists.
    NotStored,
    /// `DELETED` - the entry was removed.
    Deleted,
    /// `NOT_FOUND` - `delete` found nothing to remove.
    NotFound,
    /// `ERROR` - malformed command line.
    Error,
    /// Zero or more `VALUE` blocks followed by `END`.
    Values(Vec<Value>),
    /// `VERSION <version>`.
    Version(String),
}

impl Response {
    /// Serializes the response to its wire representation.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    ///
    /// This is more efficient than `serialize()` when you want to reuse a buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Stored => buf.extend_from_slice(b"STORED\r\n"),
            Response::NotStored => buf.extend_from_slice(b"NOT_STORED\r\n"),
            Response::Deleted => buf.extend_from_slice(b"DELETED\r\n"),
            Response::NotFound => buf.extend_from_slice(b"NOT_FOUND\r\n"),
            Response::Error => buf.extend_from_slice(b"ERROR\r\n"),
            Response::Values(values) => {
                for value in values {
                    buf.extend_from_slice(b"VALUE ");
                    buf.extend_from_slice(&value.key);
                    buf.extend_from_slice(format!(" {} {}", value.flags, value.data.len()).as_bytes());
                    buf.extend_from_slice(CRLF);
                    buf.extend_from_slice(&value.data);
                    buf.extend_from_slice(CRLF);
                }
                buf.extend_from_slice(b"END");
                buf.extend_from_slice(CRLF);
            }
            Response::Version(version) => {
                buf.extend_from_slice(b"VERSION ");
                buf.extend_from_slice(version.as_bytes());
                buf.extend_from_slice(CRLF);
            }
        }
    }
}
