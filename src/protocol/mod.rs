//! Memcached Text Protocol Implementation
//!
//! This module implements the line-oriented memcached text protocol:
//! the request/response model and an incremental parser for incoming bytes.
//!
//! ## Modules
//!
//! - `types`: the `Command` and `Response` model plus wire serialization
//! - `parser`: incremental parser turning raw bytes into [`Parsed`] units
//!
//! ## Example
//!
//! ```
//! use embercache::protocol::{parse_command, Command, Parsed, Response};
//!
//! let input = b"delete session\r\n";
//! let (parsed, consumed) = parse_command(input).unwrap().unwrap();
//! assert_eq!(consumed, input.len());
//! assert!(matches!(parsed, Parsed::Command(Command::Delete { .. })));
//!
//! assert_eq!(Response::Deleted.serialize(), b"DELETED\r\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_command, ParseError, ParseResult, Parsed, RejectReason};
pub use types::{Command, Response, StoreCommand, Value, CRLF};
