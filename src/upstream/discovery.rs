//! Entity discovery
//!
//! Fetches the tool, resource and prompt catalogs once at startup, only for
//! the categories the origin declared. Only the first page is kept.

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::StartupError;
use crate::mcp::types::{
    methods, ListPromptsResult, ListResourcesResult, ListToolsResult, Prompt, Resource,
    ServerCapabilities, Tool,
};
use crate::upstream::client::{decode_result, CallContext, UpstreamClient};

/// Catalogs captured at startup; `None` marks an undeclared category
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub tools: Option<Vec<Tool>>,
    pub resources: Option<Vec<Resource>>,
    pub prompts: Option<Vec<Prompt>>,
}

/// A discovered entity, tagged by kind
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Tool(&'a Tool),
    Resource(&'a Resource),
    Prompt(&'a Prompt),
}

impl<'a> Entity<'a> {
    /// Name for tools and prompts, URI for resources
    pub fn identity(&self) -> &'a str {
        match *self {
            Entity::Tool(t) => &t.name,
            Entity::Resource(r) => &r.uri,
            Entity::Prompt(p) => &p.name,
        }
    }
}

impl Catalog {
    /// Every discovered entity across all categories
    pub fn entities(&self) -> impl Iterator<Item = Entity<'_>> {
        let tools = self.tools.iter().flatten().map(Entity::Tool);
        let resources = self.resources.iter().flatten().map(Entity::Resource);
        let prompts = self.prompts.iter().flatten().map(Entity::Prompt);
        tools.chain(resources).chain(prompts)
    }
}

/// Fetch the catalog of every declared category
pub async fn discover(
    client: &UpstreamClient,
    ctx: &CallContext,
    capabilities: &ServerCapabilities,
) -> Result<Catalog, StartupError> {
    let mut catalog = Catalog::default();

    if capabilities.tools.is_some() {
        let page: ListToolsResult = fetch(client, ctx, methods::LIST_TOOLS).await?;
        warn_if_paged(methods::LIST_TOOLS, page.next_cursor.as_deref());
        catalog.tools = Some(page.tools);
    }

    if capabilities.resources.is_some() {
        let page: ListResourcesResult = fetch(client, ctx, methods::LIST_RESOURCES).await?;
        warn_if_paged(methods::LIST_RESOURCES, page.next_cursor.as_deref());
        catalog.resources = Some(page.resources);
    }

    if capabilities.prompts.is_some() {
        let page: ListPromptsResult = fetch(client, ctx, methods::LIST_PROMPTS).await?;
        warn_if_paged(methods::LIST_PROMPTS, page.next_cursor.as_deref());
        catalog.prompts = Some(page.prompts);
    }

    info!(
        tools = catalog.tools.as_ref().map_or(0, Vec::len),
        resources = catalog.resources.as_ref().map_or(0, Vec::len),
        prompts = catalog.prompts.as_ref().map_or(0, Vec::len),
        "discovered upstream entities"
    );

    Ok(catalog)
}

async fn fetch<T: DeserializeOwned>(
    client: &UpstreamClient,
    ctx: &CallContext,
    method: &'static str,
) -> Result<T, StartupError> {
    let raw = client
        .call(ctx, method, None)
        .await
        .map_err(|source| StartupError::Discovery { method, source })?;

    decode_result(method, &raw).map_err(|e| StartupError::Decode {
        method,
        message: e.to_string(),
    })
}

fn warn_if_paged(method: &str, next_cursor: Option<&str>) {
    if next_cursor.is_some() {
        warn!(method, "origin returned more than one page; only the first is used");
    }
}
