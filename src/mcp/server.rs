//! MCP Server implementation
//!
//! Local front end of the proxy: reads one request at a time from the line
//! transport, answers `initialize` and the `*/list` methods from state frozen
//! at startup, and hands entity invocations to the dispatcher.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{McpError, Result};
use crate::mcp::codec::{decode_request, LineTransport};
use crate::mcp::dispatch::Dispatcher;
use crate::mcp::types::*;
use crate::upstream::client::{CallContext, UpstreamClient};
use crate::upstream::discovery::{discover, Catalog};
use crate::upstream::negotiate::{negotiate, Negotiated, PROXY_CLIENT_NAME};

/// MCP Server info
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP server fronting one upstream origin
pub struct McpServer {
    /// Capability descriptor negotiated with the origin
    capabilities: ServerCapabilities,

    /// Pre-rendered `initialize` result
    initialize_result: Value,

    /// Pre-rendered `*/list` results; `None` for undeclared categories
    tools_list: Option<Value>,
    resources_list: Option<Value>,
    prompts_list: Option<Value>,

    /// Forward routes for entity invocations
    dispatcher: Dispatcher,

    /// Whether the client sent `notifications/initialized`
    initialized: bool,
}

impl McpServer {
    /// Create a server from the state captured at startup
    pub fn new(
        selector: &str,
        negotiated: Negotiated,
        catalog: &Catalog,
        dispatcher: Dispatcher,
    ) -> Result<Self> {
        let capabilities = negotiated.capabilities;

        let initialize_result = serde_json::to_value(InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            server_info: Some(ServerInfo {
                name: format!("{}/{}", PROXY_CLIENT_NAME, selector),
                version: SERVER_VERSION.to_string(),
            }),
            capabilities: capabilities.advertised(),
            instructions: negotiated.instructions,
        })?;

        let tools_list = render(catalog.tools.as_ref().map(|tools| ListToolsResult {
            tools: tools.clone(),
            next_cursor: None,
        }))?;
        let resources_list = render(catalog.resources.as_ref().map(|resources| {
            ListResourcesResult {
                resources: resources.clone(),
                next_cursor: None,
            }
        }))?;
        let prompts_list = render(catalog.prompts.as_ref().map(|prompts| ListPromptsResult {
            prompts: prompts.clone(),
            next_cursor: None,
        }))?;

        Ok(Self {
            capabilities,
            initialize_result,
            tools_list,
            resources_list,
            prompts_list,
            dispatcher,
            initialized: false,
        })
    }

    /// Negotiate with the origin, discover its entities and build the server
    ///
    /// Any failure here is fatal: nothing has been read from the local
    /// transport yet.
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        let ctx = CallContext::with_timeout(config.timeout);
        let client = Arc::new(UpstreamClient::new(config.origin_url.as_str()));

        let negotiated = negotiate(&client, &ctx).await?;
        let catalog = discover(&client, &ctx, &negotiated.capabilities).await?;
        let dispatcher = Dispatcher::new(client, ctx, &catalog);

        if dispatcher.is_empty() {
            warn!(upstream = %config.selector, "origin exposes no tools, resources or prompts");
        }
        info!(
            upstream = %config.selector,
            origin = negotiated.origin_name(),
            routes = dispatcher.len(),
            "proxy ready"
        );

        Self::new(&config.selector, negotiated, &catalog, dispatcher)
    }

    /// Run the server on stdio
    pub async fn run_stdio(&mut self) -> Result<()> {
        let mut transport = LineTransport::new(tokio::io::stdin(), tokio::io::stdout());
        self.run(&mut transport).await
    }

    /// Serve requests from `transport` until end of stream
    pub async fn run<R, W>(&mut self, transport: &mut LineTransport<R, W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP proxy serving on line transport");

        while let Some(line) = transport.read_line().await? {
            if let Some(response) = self.handle_message(&line).await {
                transport.write_response(&response).await?;
            }
        }

        info!("input closed, shutting down");
        Ok(())
    }

    /// Handle one incoming line; `None` when no response is due
    pub async fn handle_message(&mut self, line: &str) -> Option<JsonRpcResponse> {
        match decode_request(line) {
            Ok(request) => self.handle_request(request).await,
            Err(parse_error) => Some(parse_error),
        }
    }

    /// Handle a decoded JSON-RPC message
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        // No id, no reply: whatever the method, nothing is forwarded
        if request.is_notification() {
            debug!(method = %request.method, "received notification");
            if request.method == methods::INITIALIZED {
                self.initialized = true;
            }
            return None;
        }

        let id = request.response_id();
        debug!(method = %request.method, id = ?id, "received request");

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(format!(
                    "Unsupported jsonrpc version: {}",
                    request.jsonrpc
                )),
            ));
        }

        let outcome = self.dispatch(&request.method, request.params).await;

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                warn!(method = %request.method, code = e.code(), error = %e, "request failed");
                JsonRpcResponse::error(id, JsonRpcError::from(&e))
            }
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, McpError> {
        let not_found = || McpError::MethodNotFound {
            method: method.to_string(),
        };

        match method {
            methods::INITIALIZE => {
                // The origin was initialized at startup with the proxy's identity
                let init = params.and_then(|p| serde_json::from_value::<InitializeParams>(p).ok());
                if let Some(init) = init {
                    info!(
                        client = %init.client_info.name,
                        client_version = %init.client_info.version,
                        protocol_version = %init.protocol_version,
                        "local client initializing"
                    );
                }
                Ok(self.initialize_result.clone())
            }
            methods::PING => Ok(json!({})),

            methods::LIST_TOOLS => self.tools_list.clone().ok_or_else(not_found),
            methods::LIST_RESOURCES => self.resources_list.clone().ok_or_else(not_found),
            methods::LIST_PROMPTS => self.prompts_list.clone().ok_or_else(not_found),

            methods::CALL_TOOL if self.capabilities.tools.is_some() => {
                self.dispatcher.call_tool(params).await
            }
            methods::READ_RESOURCE if self.capabilities.resources.is_some() => {
                self.dispatcher.read_resource(params).await
            }
            methods::GET_PROMPT if self.capabilities.prompts.is_some() => {
                self.dispatcher.get_prompt(params).await
            }
            methods::SET_LOG_LEVEL if self.capabilities.logging.is_some() => {
                self.dispatcher.forward_method(method, params.as_ref()).await
            }

            _ => Err(not_found()),
        }
    }
}

fn render<T: Serialize>(list: Option<T>) -> Result<Option<Value>> {
    Ok(list.map(serde_json::to_value).transpose()?)
}
