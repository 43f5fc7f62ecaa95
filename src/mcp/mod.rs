//! MCP (Model Context Protocol) module
//!
//! Local front end of the proxy: line codec, protocol types, dispatch
//! registry and the request loop.

pub mod codec;
pub mod dispatch;
pub mod server;
pub mod types;
