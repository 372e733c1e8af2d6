//! # embercache - A Memcached-Compatible In-Memory Cache
//!
//! embercache is an in-memory caching server speaking the memcached text
//! protocol, written in Rust. It serves the mutation commands (`add`,
//! `set`, `delete`) with deterministic outcomes under concurrency, plus
//! retrieval and the session commands a memcached client expects.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          embercache                             │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │          │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │          │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘          │
//! │                                               │                 │
//! │                                               ▼                 │
//! │  ┌─────────────┐    ┌────────────────────────────────────────┐  │
//! │  │  Command    │    │             CacheEngine                │  │
//! │  │  Parser     │    │  ┌────────┐ ┌────────┐ ┌────────┐      │  │
//! │  │             │    │  │Shard 0 │ │Shard 1 │ │...N    │      │  │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │shards  │      │  │
//! │                     │  └────────┘ └────────┘ └────────┘      │  │
//! │                     └────────────────────────────────────────┘  │
//! │                                               ▲                 │
//! │                                               │                 │
//! │                     ┌─────────────────────────┴──────────────┐  │
//! │                     │            ExpirySweeper               │  │
//! │                     │        (Background Tokio Task)         │  │
//! │                     └────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `set <key> <flags> <exptime> <bytes> [noreply]` - store unconditionally
//! - `add <key> <flags> <exptime> <bytes> [noreply]` - store if absent
//! - `delete <key> [noreply]` - remove an entry (a deprecated numeric
//!   hold-off argument is accepted and ignored)
//! - `get <key> [<key> ...]` - retrieve entries
//! - `version`, `quit`
//!
//! ## Design Highlights
//!
//! ### Deterministic mutation outcomes
//!
//! Every mutation is a single atomic check-and-update under its shard's
//! write lock. Of N concurrent `add`s on one absent key, exactly one
//! client sees `STORED`; a racing `add` and `delete` on the same key
//! always serialize one way or the other, never both against the old
//! state.
//!
//! ### noreply
//!
//! A command carrying `noreply` produces zero response bytes, even when
//! the answer would have been `ERROR`. The client has declared it will
//! not read; the store's state is the only contract.
//!
//! ### Lazy + Active Expiry
//!
//! Expired entries count as absent the moment their deadline passes.
//! They are reclaimed on access and by a background sweeper task.
//!
//! ## Quick Start
//!
//! ```ignore
//! use embercache::commands::CommandHandler;
//! use embercache::connection::{handle_connection, ConnectionStats};
//! use embercache::storage::{start_expiry_sweeper, CacheEngine};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = Arc::new(CacheEngine::new());
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&cache));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:11211").await.unwrap();
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&cache));
//!         tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: text protocol parser and wire types
//! - [`storage`]: thread-safe cache engine with expiry support
//! - [`commands`]: command dispatch and response encoding
//! - [`connection`]: client connection management
//! - [`cluster`]: consistent-hash ring for client-side sharding

pub mod cluster;
pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use cluster::HashRing;
pub use commands::{mutation_reply, CommandHandler};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{parse_command, Command, ParseError, Parsed, Response};
pub use storage::{start_expiry_sweeper, CacheEngine, Entry, ExpirySweeper, MutationOutcome};

/// The default port embercache listens on (same as memcached)
pub const DEFAULT_PORT: u16 = 11211;

/// The default host embercache binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of embercache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
