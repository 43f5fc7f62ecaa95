//! Upstream wire types
//!
//! The JSON-RPC envelope exchanged with the origin over HTTP. The result is
//! kept as raw JSON so each caller decodes it into the shape it expects.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::mcp::types::JSONRPC_VERSION;

/// Request body POSTed to the origin
#[derive(Debug, Serialize)]
pub struct UpstreamRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a Value>,
}

impl<'a> UpstreamRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<&'a Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// Response body returned by the origin
///
/// The echoed `id` is ignored: every call is an independent exchange.
#[derive(Debug, Deserialize)]
pub struct UpstreamResponse {
    #[serde(default)]
    pub result: Option<Box<RawValue>>,

    #[serde(default)]
    pub error: Option<UpstreamErrorObject>,
}

/// Error object carried in an upstream response
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamErrorObject {
    pub code: i64,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub data: Option<Value>,
}
