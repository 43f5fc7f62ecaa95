//! MCP HTTP Proxy Library
//!
//! Exposes a line-delimited JSON-RPC (MCP) interface locally and forwards
//! calls to a remote JSON-RPC-over-HTTP origin, mirroring only the
//! capabilities and entities the origin declares.

pub mod config;
pub mod error;
pub mod mcp;
pub mod upstream;

pub use config::Config;
pub use error::{ProxyError, Result};
