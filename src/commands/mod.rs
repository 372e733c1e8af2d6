//! Command Processing Layer
//!
//! This module sits between the protocol parser and the cache engine:
//! it receives parsed units, executes them against storage, and decides
//! what (if anything) goes back on the wire.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Command Parser  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Encode reply │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  CacheEngine    │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

// Re-export the main command handler
pub use handler::{mutation_reply, CommandHandler};
