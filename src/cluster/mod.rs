//! Client-Side Cluster Support
//!
//! A single embercache process is a standalone cache node; scaling out is
//! a client concern. This module provides the building block for that:
//! a consistent-hash ring that assigns keys to nodes and picks distinct
//! replica sets when clients replicate writes across nodes.

pub mod ring;

pub use ring::{HashRing, DEFAULT_VIRTUAL_NODES};
