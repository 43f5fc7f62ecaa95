//! Error types for the MCP HTTP proxy
//!
//! This module defines the error hierarchy for all operations in the proxy.

use serde_json::Value;
use thiserror::Error;

use crate::mcp::types::error_codes;

/// Main error type for the MCP HTTP proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Negotiation / discovery failures before serving
    #[error("Startup error: {0}")]
    Startup(#[from] StartupError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing upstream selector")]
    MissingSelector,

    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: String },

    #[error("Invalid origin URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

/// Errors raised by a single upstream JSON-RPC exchange.
///
/// Everything except [`UpstreamError::Application`] is a transport failure:
/// the origin could not be reached or did not answer with a usable envelope.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("upstream returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("upstream request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("invalid upstream envelope: {message}")]
    InvalidEnvelope { message: String },

    #[error("upstream error {code}: {message}")]
    Application {
        code: i64,
        message: String,
        data: Option<Value>,
    },
}

impl UpstreamError {
    /// True when the origin was unreachable or answered with something other
    /// than a JSON-RPC response. False for errors the origin reported itself.
    pub fn is_transport(&self) -> bool {
        !matches!(self, UpstreamError::Application { .. })
    }
}

/// Fatal errors raised while preparing the proxy, before any request is served
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("initialize handshake failed: {0}")]
    Negotiation(#[source] UpstreamError),

    #[error("{method} discovery failed: {source}")]
    Discovery {
        method: &'static str,
        #[source]
        source: UpstreamError,
    },

    #[error("undecodable {method} result: {message}")]
    Decode {
        method: &'static str,
        message: String,
    },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Unknown resource: {uri}")]
    UnknownResource { uri: String },

    #[error("Unknown prompt: {name}")]
    UnknownPrompt { name: String },

    #[error("{0}")]
    Upstream(#[from] UpstreamError),

    #[error("Undecodable upstream result: {message}")]
    InvalidResult { message: String },
}

impl McpError {
    /// JSON-RPC error code reported to the local caller
    pub fn code(&self) -> i32 {
        match self {
            McpError::MethodNotFound { .. } => error_codes::METHOD_NOT_FOUND,
            McpError::InvalidParams { .. } => error_codes::INVALID_PARAMS,
            McpError::UnknownTool { .. }
            | McpError::UnknownResource { .. }
            | McpError::UnknownPrompt { .. }
            | McpError::Upstream(_)
            | McpError::InvalidResult { .. } => error_codes::INTERNAL_ERROR,
        }
    }
}

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::MissingEnvVar {
            var: "ASSISTANT_API_URL".to_string(),
        };
        assert!(err.to_string().contains("ASSISTANT_API_URL"));
    }

    #[test]
    fn test_error_conversion() {
        let err: ProxyError = ConfigError::MissingSelector.into();
        assert!(matches!(err, ProxyError::Config(_)));
    }

    #[test]
    fn test_transport_vs_application() {
        let status = UpstreamError::HttpStatus {
            status: 500,
            body: "boom".to_string(),
        };
        assert!(status.is_transport());

        let app = UpstreamError::Application {
            code: -32000,
            message: "rejected".to_string(),
            data: None,
        };
        assert!(!app.is_transport());
    }

    #[test]
    fn test_mcp_error_codes() {
        assert_eq!(
            McpError::MethodNotFound { method: "x".into() }.code(),
            -32601
        );
        assert_eq!(
            McpError::InvalidParams { message: "x".into() }.code(),
            -32602
        );
        assert_eq!(McpError::UnknownTool { name: "x".into() }.code(), -32603);

        let upstream: McpError = UpstreamError::HttpStatus {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert_eq!(upstream.code(), -32603);
        assert!(upstream.to_string().contains("502"));
        assert!(upstream.to_string().contains("bad gateway"));
    }
}
