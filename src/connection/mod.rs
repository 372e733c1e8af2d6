//! Connection Management
//!
//! Each accepted client connection is handled by its own async task,
//! allowing the server to serve many clients concurrently. The connection
//! layer owns the read buffer and the response writer; the shared cache
//! behind the command handler is the only state connections have in common.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                      (main.rs)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept() + spawn
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ Read bytes  │──>│ Parse line  │──>│ Execute cmd │       │
//! │  └─────────────┘   └─────────────┘   └──────┬──────┘       │
//! │                                             │               │
//! │                                             ▼               │
//! │                              ┌───────────────────────────┐  │
//! │                              │ Write reply - or nothing, │  │
//! │                              │ if noreply was requested  │  │
//! │                              └───────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
