//! cache_list tool implementation.
//!
//! Reports the cache stores, their entries and the pending submission queues.

use offgrid_client::Gateway;
use offgrid_client::gateway::{LAST_REFRESH_KEY, WorkerState};
use offgrid_core::{CacheKey, CacheMetadata, SubmissionKind};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// List the request keys held in this store.
    #[serde(default)]
    pub store: Option<String>,

    /// Look up the cache metadata recorded for this URL.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StoreSummary {
    pub name: String,
    pub entries: u64,
    /// Whether this is the live store of the running version.
    pub current: bool,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheListOutput {
    pub version: String,
    pub state: WorkerState,
    pub stores: Vec<StoreSummary>,
    /// Keys of the requested store, oldest first.
    pub keys: Option<Vec<CacheKey>>,
    pub metadata: Option<CacheMetadata>,
    pub pending_contact_forms: usize,
    pub pending_bookings: usize,
    /// When cached content was last refreshed in the background.
    pub last_content_refresh: Option<serde_json::Value>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(gateway: &Gateway, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let db = gateway.db();

    let mut stores = Vec::new();
    for name in db.store_names().await? {
        let entries = db.count_entries(&name).await?;
        let current = name == gateway.version();
        stores.push(StoreSummary { name, entries, current });
    }

    let keys = match &params.store {
        Some(store) => Some(db.store_keys(store).await?),
        None => None,
    };
    let metadata = match &params.url {
        Some(url) => db.cache_metadata(gateway.resolve(url)?.as_str()).await?,
        None => None,
    };

    let output = CacheListOutput {
        version: gateway.version().to_string(),
        state: gateway.state().await,
        stores,
        keys,
        metadata,
        pending_contact_forms: db.list_submissions(SubmissionKind::ContactForm).await?.len(),
        pending_bookings: db.list_submissions(SubmissionKind::Booking).await?.len(),
        last_content_refresh: db.get_preference(LAST_REFRESH_KEY).await?,
    };

    json_result(&output)
}
