//! Upstream origin module
//!
//! HTTP JSON-RPC client plus the one-time negotiation and discovery steps
//! run against the origin at startup.

pub mod client;
pub mod discovery;
pub mod negotiate;
pub mod types;
