//! Miscellaneous API endpoints
//!
//! Configured chain listing and service version.

use actix_web::{get, web, Responder};
use serde::{Deserialize, Serialize};

use crate::{
    configuration::{AppState, State},
    error::Error,
};

// =============================================================================
// Chains
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResponse {
    pub chain_id: String,
    pub name: String,
    pub symbol: String,
    pub has_rpc: bool,
    pub coingecko_id: Option<String>,
}

#[get("/chains")]
pub async fn chains(
    state: web::Data<AppState<State>>,
) -> Result<impl Responder, Error> {
    let data: Vec<ChainResponse> = state
        .config
        .chains
        .iter()
        .map(|chain| ChainResponse {
            chain_id: chain.chain_id.to_owned(),
            name: chain.name.to_owned(),
            symbol: chain.symbol.to_owned(),
            has_rpc: chain.rpc_url.is_some(),
            coingecko_id: chain.coingecko_id.to_owned(),
        })
        .collect();

    Ok(web::Json(data))
}

// =============================================================================
// Version
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse<'a> {
    pub version: Option<&'a str>,
}

#[get("/version")]
pub async fn version() -> Result<impl Responder, Error> {
    const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

    Ok(web::Json(VersionResponse { version: VERSION }))
}
