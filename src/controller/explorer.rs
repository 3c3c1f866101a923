//! Explorer endpoint
//!
//! Latest blocks, transactions, interchain messages and chain stats for a
//! single configured chain.

use actix_web::{get, web, HttpResponse};
use serde_json::json;
use tracing::{debug, error};

use crate::{
    aggregator::{explorer::build_snapshot, fetchers::fetch_glacier_support},
    cache::CacheEntry,
    cache_keys::{explorer_key, glacier_support_key},
    configuration::{AppState, State},
    error::Error,
    types::{ExplorerResponse, Scope},
};

#[get("/explorer/{scope}")]
pub async fn explorer(
    state: web::Data<AppState<State>>,
    path: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let chain_id = path.into_inner();
    let chain = state.get_chain(&chain_id)?;
    let key = explorer_key(&Scope::Chain(chain_id.to_owned()));

    let snapshot = match state.api_cache.explorer.get_fresh(&key).await {
        Some(entry) => {
            debug!("Cache hit: {}", key);
            entry.payload
        },
        None => {
            match build_snapshot(state.upstream.clone(), &state.config, chain)
                .await
            {
                Ok(snapshot) => {
                    state
                        .api_cache
                        .explorer
                        .set(&key, CacheEntry::new(snapshot.clone(), None))
                        .await;
                    snapshot
                },
                Err(e @ Error::RpcNotConfigured(_)) => return Err(e),
                Err(e) => {
                    error!("Explorer snapshot failed for {}: {}", chain_id, e);
                    return Ok(HttpResponse::InternalServerError().json(json!({
                        "error": "Failed to fetch explorer data",
                        "details": e.to_string(),
                        "chainId": chain_id,
                    })));
                },
            }
        },
    };

    let glacier_supported = glacier_supported(&state, &chain_id).await;

    Ok(HttpResponse::Ok().json(ExplorerResponse {
        snapshot,
        glacier_supported,
    }))
}

async fn glacier_supported(state: &State, chain_id: &str) -> bool {
    let key = glacier_support_key(chain_id);

    if let Some(entry) = state.api_cache.glacier_support.get_fresh(&key).await {
        return entry.payload;
    }

    let supported = fetch_glacier_support(state.upstream.as_ref(), chain_id).await;
    state
        .api_cache
        .glacier_support
        .set(&key, CacheEntry::new(supported, None))
        .await;

    supported
}
