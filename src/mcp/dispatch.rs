//! Dynamic dispatch of entity invocations to the origin
//!
//! Every discovered entity gets a forward route keyed by its identity. An
//! invocation is looked up by identity and re-issued upstream with the
//! caller's params forwarded verbatim. The upstream result is checked
//! against the shape its method must have and then returned untouched.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::McpError;
use crate::mcp::types::{
    methods, CallToolParams, CallToolResult, GetPromptParams, GetPromptResult,
    ReadResourceParams, ReadResourceResult,
};
use crate::upstream::client::{decode_result, CallContext, UpstreamClient};
use crate::upstream::discovery::{Catalog, Entity};

/// Capability category an entity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Tools,
    Resources,
    Prompts,
}

impl Category {
    /// Upstream method that invokes an entity of this category
    pub fn upstream_method(self) -> &'static str {
        match self {
            Category::Tools => methods::CALL_TOOL,
            Category::Resources => methods::READ_RESOURCE,
            Category::Prompts => methods::GET_PROMPT,
        }
    }

    fn of(entity: &Entity<'_>) -> Self {
        match entity {
            Entity::Tool(_) => Category::Tools,
            Entity::Resource(_) => Category::Resources,
            Entity::Prompt(_) => Category::Prompts,
        }
    }
}

/// Where an invocation of one entity is forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub category: Category,
    pub upstream_method: &'static str,
}

/// Registry of forward routes, built once from the discovered catalog
pub struct Dispatcher {
    client: Arc<UpstreamClient>,
    ctx: CallContext,
    routes: HashMap<(Category, String), Route>,
}

impl Dispatcher {
    /// Register a route for every entity in `catalog`
    pub fn new(client: Arc<UpstreamClient>, ctx: CallContext, catalog: &Catalog) -> Self {
        let mut routes = HashMap::new();

        for entity in catalog.entities() {
            let category = Category::of(&entity);
            let identity = entity.identity().to_string();
            let route = Route {
                category,
                upstream_method: category.upstream_method(),
            };

            if routes.insert((category, identity.clone()), route).is_some() {
                warn!(?category, %identity, "duplicate entity identity; keeping the last one");
            }
        }

        debug!(routes = routes.len(), "built dispatch registry");

        Self {
            client,
            ctx,
            routes,
        }
    }

    /// Look up the route registered for `identity`
    pub fn route(&self, category: Category, identity: &str) -> Option<Route> {
        self.routes
            .get(&(category, identity.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Forward a `tools/call` invocation
    pub async fn call_tool(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params = require_params(params)?;
        let call: CallToolParams = parse_params(&params)?;
        let route = self
            .route(Category::Tools, &call.name)
            .ok_or(McpError::UnknownTool { name: call.name })?;

        self.forward::<CallToolResult>(route, &params).await
    }

    /// Forward a `resources/read` invocation
    pub async fn read_resource(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params = require_params(params)?;
        let read: ReadResourceParams = parse_params(&params)?;
        let route = self
            .route(Category::Resources, &read.uri)
            .ok_or(McpError::UnknownResource { uri: read.uri })?;

        self.forward::<ReadResourceResult>(route, &params).await
    }

    /// Forward a `prompts/get` invocation
    pub async fn get_prompt(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params = require_params(params)?;
        let get: GetPromptParams = parse_params(&params)?;
        let route = self
            .route(Category::Prompts, &get.name)
            .ok_or(McpError::UnknownPrompt { name: get.name })?;

        self.forward::<GetPromptResult>(route, &params).await
    }

    /// Forward an arbitrary method with no entity behind it
    pub async fn forward_method(
        &self,
        method: &str,
        params: Option<&Value>,
    ) -> Result<Value, McpError> {
        let raw = self.client.call(&self.ctx, method, params).await?;
        decode(method, &raw)
    }

    /// Re-issue the call upstream; the identity already sits in `params`
    ///
    /// `T` is the shape the result must decode into. The value handed back
    /// is the upstream result as received, unknown fields included.
    async fn forward<T: DeserializeOwned>(
        &self,
        route: Route,
        params: &Value,
    ) -> Result<Value, McpError> {
        debug!(method = route.upstream_method, category = ?route.category, "forwarding");

        let raw = self
            .client
            .call(&self.ctx, route.upstream_method, Some(params))
            .await?;

        decode::<T>(route.upstream_method, &raw)?;
        decode(route.upstream_method, &raw)
    }
}

fn decode<T: DeserializeOwned>(method: &str, raw: &RawValue) -> Result<T, McpError> {
    decode_result(method, raw).map_err(|e| McpError::InvalidResult {
        message: e.to_string(),
    })
}

fn require_params(params: Option<Value>) -> Result<Value, McpError> {
    params.ok_or_else(|| McpError::InvalidParams {
        message: "missing params".to_string(),
    })
}

fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, McpError> {
    serde_json::from_value(params.clone()).map_err(|e| McpError::InvalidParams {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::{Prompt, Resource, Tool};
    use serde_json::{json, Map};
    use wiremock::matchers::{body_json, body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog() -> Catalog {
        Catalog {
            tools: Some(vec![Tool {
                name: "echo".into(),
                description: None,
                input_schema: json!({"type": "object"}),
                extra: Map::new(),
            }]),
            resources: Some(vec![Resource {
                uri: "note://1".into(),
                name: "first note".into(),
                description: None,
                mime_type: Some("text/plain".into()),
                extra: Map::new(),
            }]),
            prompts: Some(vec![Prompt {
                name: "echo".into(),
                description: None,
                arguments: vec![],
                extra: Map::new(),
            }]),
        }
    }

    fn dispatcher(uri: &str) -> Dispatcher {
        Dispatcher::new(
            Arc::new(UpstreamClient::new(uri)),
            CallContext::default(),
            &catalog(),
        )
    }

    #[test]
    fn test_registry_keys_by_category_and_identity() {
        let d = dispatcher("http://127.0.0.1:1");
        assert_eq!(d.len(), 3);
        assert!(!d.is_empty());

        let tool = d.route(Category::Tools, "echo").unwrap();
        assert_eq!(tool.upstream_method, "tools/call");

        let prompt = d.route(Category::Prompts, "echo").unwrap();
        assert_eq!(prompt.upstream_method, "prompts/get");

        let resource = d.route(Category::Resources, "note://1").unwrap();
        assert_eq!(resource.upstream_method, "resources/read");

        assert!(d.route(Category::Tools, "note://1").is_none());
    }

    #[tokio::test]
    async fn test_call_tool_forwards_params_verbatim() {
        let server = MockServer::start().await;
        let params = json!({"name": "echo", "arguments": {"text": "hi"}});
        Mock::given(method("POST"))
            .and(body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": params.clone()
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"content": [{"type": "text", "text": "hi"}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = dispatcher(&server.uri())
            .call_tool(Some(params))
            .await
            .unwrap();
        assert_eq!(result, json!({"content": [{"type": "text", "text": "hi"}]}));
    }

    #[tokio::test]
    async fn test_call_tool_result_relayed_whole() {
        let server = MockServer::start().await;
        let upstream = json!({
            "_meta": {"trace": "abc"},
            "content": [{"type": "text", "text": "hi"}],
            "isError": false,
            "structuredContent": {"n": 1}
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": upstream.clone()
            })))
            .mount(&server)
            .await;

        let result = dispatcher(&server.uri())
            .call_tool(Some(json!({"name": "echo"})))
            .await
            .unwrap();
        assert_eq!(result, upstream);
    }

    #[tokio::test]
    async fn test_misshapen_result_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": {"text": "no content array"}
            })))
            .mount(&server)
            .await;

        let err = dispatcher(&server.uri())
            .call_tool(Some(json!({"name": "echo"})))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidResult { .. }));
        assert_eq!(err.code(), -32603);
    }

    #[tokio::test]
    async fn test_unknown_tool_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = dispatcher(&server.uri())
            .call_tool(Some(json!({"name": "missing"})))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::UnknownTool { ref name } if name == "missing"));
        assert_eq!(err.code(), -32603);
    }

    #[tokio::test]
    async fn test_malformed_params_are_invalid() {
        let d = dispatcher("http://127.0.0.1:1");

        let err = d.call_tool(None).await.unwrap_err();
        assert_eq!(err.code(), -32602);

        let err = d.read_resource(Some(json!({"url": "x"}))).await.unwrap_err();
        assert_eq!(err.code(), -32602);

        let err = d.get_prompt(Some(json!("echo"))).await.unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[tokio::test]
    async fn test_read_resource_and_get_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "resources/read"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "result": {"contents": [{"uri": "note://1", "text": "hello"}]}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "prompts/get"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 2,
                "result": {"messages": [{"role": "user", "content": {"type": "text", "text": "x"}}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let d = dispatcher(&server.uri());
        let read = d
            .read_resource(Some(json!({"uri": "note://1"})))
            .await
            .unwrap();
        assert_eq!(read["contents"][0]["text"], "hello");

        let prompt = d
            .get_prompt(Some(json!({"name": "echo", "arguments": {}})))
            .await
            .unwrap();
        assert_eq!(prompt["messages"].as_array().unwrap().len(), 1);
        assert!(prompt.get("description").is_none());
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": {"code": -32000, "message": "echo is broken"}
            })))
            .mount(&server)
            .await;

        let err = dispatcher(&server.uri())
            .call_tool(Some(json!({"name": "echo"})))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Upstream(ref e) if !e.is_transport()));
        assert!(err.to_string().contains("echo is broken"));
    }
}
