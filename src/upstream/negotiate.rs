//! Capability negotiation
//!
//! One `initialize` handshake with the origin at startup. The resulting
//! capability descriptor is frozen for the lifetime of the process.

use serde_json::json;
use tracing::info;

use crate::error::StartupError;
use crate::mcp::types::{methods, InitializeResult, ServerCapabilities, ServerInfo, MCP_VERSION};
use crate::upstream::client::{CallContext, UpstreamClient};

/// Name the proxy identifies itself with when talking to the origin
pub const PROXY_CLIENT_NAME: &str = "mcp-http-proxy";

/// Outcome of the handshake with the origin
#[derive(Debug, Clone)]
pub struct Negotiated {
    /// Protocol version the origin answered with
    pub protocol_version: String,

    /// Origin identity, if it sent one
    pub server_info: Option<ServerInfo>,

    /// Frozen capability descriptor
    pub capabilities: ServerCapabilities,

    /// Instructions the origin offers its clients
    pub instructions: Option<String>,
}

impl Negotiated {
    /// Name the origin reported for itself
    pub fn origin_name(&self) -> &str {
        self.server_info
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or("unknown")
    }
}

/// Perform the `initialize` handshake with the origin
///
/// Sends the proxy's own identity; no local client is connected yet.
pub async fn negotiate(
    client: &UpstreamClient,
    ctx: &CallContext,
) -> Result<Negotiated, StartupError> {
    let params = json!({
        "protocolVersion": MCP_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": PROXY_CLIENT_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    });

    let result: InitializeResult = client
        .call_as(ctx, methods::INITIALIZE, Some(&params))
        .await
        .map_err(StartupError::Negotiation)?;

    let negotiated = Negotiated {
        protocol_version: result.protocol_version,
        server_info: result.server_info,
        capabilities: result.capabilities,
        instructions: result.instructions,
    };

    let caps = &negotiated.capabilities;
    info!(
        origin = %client.origin_url(),
        protocol_version = %negotiated.protocol_version,
        server = negotiated.origin_name(),
        tools = caps.tools.is_some(),
        resources = caps.resources.is_some(),
        prompts = caps.prompts.is_some(),
        logging = caps.logging.is_some(),
        "negotiated upstream capabilities"
    );

    Ok(negotiated)
}
