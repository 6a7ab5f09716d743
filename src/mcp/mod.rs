//! MCP (Model Context Protocol) client messages
//!
//! Request and notification builders shared by the SSE and stdio probes,
//! following the JSON-RPC 2.0 specification.


pub mod protocol;

pub use protocol::*;
