//! Shared adapter initialization.
//!
//! Every subcommand builds the same adapters from the environment.  An
//! adapter whose credentials are missing (or that fails to connect) is
//! skipped and reported rather than aborting startup.

use std::collections::BTreeSet;
use std::sync::Arc;

use pmagency_adapters::{
    Adapter, ClickUpAdapter, ClickUpConfig, NotionAdapter, NotionConfig, WhatsAppAdapter,
    WhatsAppConfig,
};
use pmagency_agent::ToolAdapter;
use tracing::{info, warn};

use crate::bridge::AdapterBridge;
use crate::helpers::env_non_empty;

/// Task database the shipped agency works against.
pub const DEFAULT_NOTION_DATABASE_ID: &str = "1a88235ee2ff801e8f93d8ab2e14de1d";

/// An adapter that was left out, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAdapter {
    pub id: String,
    pub reason: String,
}

/// The result of initializing all adapters.
#[derive(Default)]
pub struct InitializedAdapters {
    /// Agent-side tool adapters (wrapped in `AdapterBridge`).
    pub tool_adapters: Vec<Arc<dyn ToolAdapter>>,

    /// Adapter-side handles, for health checks and listings.
    pub raw_adapters: Vec<Arc<dyn Adapter>>,

    /// Adapters that are not available in this environment.
    pub skipped: Vec<SkippedAdapter>,
}

impl InitializedAdapters {
    /// Names of every tool the connected adapters expose.
    pub fn tool_names(&self) -> BTreeSet<String> {
        self.raw_adapters
            .iter()
            .flat_map(|a| a.tools())
            .map(|t| t.name)
            .collect()
    }

    async fn add(&mut self, mut adapter: impl Adapter + 'static) {
        let id = adapter.id().to_owned();
        match adapter.connect().await {
            Ok(()) => {
                let adapter: Arc<dyn Adapter> = Arc::new(adapter);
                self.tool_adapters
                    .push(Arc::new(AdapterBridge::new(Arc::clone(&adapter))));
                self.raw_adapters.push(adapter);
            }
            Err(e) => {
                warn!(adapter = %id, error = %e, "adapter failed to connect");
                self.skip(id, e.to_string());
            }
        }
    }

    fn skip(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedAdapter {
            id: id.into(),
            reason: reason.into(),
        });
    }
}

/// Initialize and connect all adapters from the process environment.
pub async fn init_adapters() -> InitializedAdapters {
    init_adapters_from(env_non_empty).await
}

/// Initialize and connect all adapters, reading settings through `lookup`.
pub async fn init_adapters_from(lookup: impl Fn(&str) -> Option<String>) -> InitializedAdapters {
    let mut out = InitializedAdapters::default();

    match lookup("NOTION_INTEGRATION_SECRET") {
        Some(token) => {
            let database_id = lookup("NOTION_DATABASE_ID")
                .unwrap_or_else(|| DEFAULT_NOTION_DATABASE_ID.to_owned());
            out.add(NotionAdapter::new(
                "notion",
                NotionConfig::new(&token, &database_id),
            ))
            .await;
        }
        None => out.skip("notion", "set NOTION_INTEGRATION_SECRET"),
    }

    match lookup("CLICKUP_TOKEN") {
        Some(token) => {
            let mut config = ClickUpConfig::new(&token);
            if let Some(list_id) = lookup("CLICKUP_DEFAULT_LIST_ID") {
                config = config.with_default_list(&list_id);
            }
            out.add(ClickUpAdapter::new("clickup", config)).await;
        }
        None => out.skip("clickup", "set CLICKUP_TOKEN"),
    }

    let evolution = (
        lookup("EVOLUTION_API_URL"),
        lookup("EVOLUTION_API_KEY"),
        lookup("EVOLUTION_API_INSTANCE"),
    );
    match evolution {
        (Some(url), Some(key), Some(instance)) => {
            out.add(WhatsAppAdapter::new(
                "whatsapp",
                WhatsAppConfig::new(&url, &key, &instance),
            ))
            .await;
        }
        _ => out.skip(
            "whatsapp",
            "set EVOLUTION_API_URL, EVOLUTION_API_KEY and EVOLUTION_API_INSTANCE",
        ),
    }

    info!(
        connected = out.raw_adapters.len(),
        skipped = out.skipped.len(),
        "adapters initialized"
    );
    out
}
