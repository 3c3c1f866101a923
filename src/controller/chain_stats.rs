//! Chain statistics endpoint
//!
//! Serves aggregated metric series for one chain, or for every chain
//! through the `all` scope, from the chain stats cache.

use std::time::{Duration, Instant};

use actix_web::{get, http::StatusCode, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::{
    aggregator::{aggregate, refresh_auxiliary},
    cache::CacheEntry,
    cache_keys::CacheKey,
    configuration::{AppState, State},
    error::Error,
    helpers::{parse_metric_request, ChainStatsParams},
    types::{ChainStatsPayload, MetricRequest, Window},
};

pub const DATA_SOURCE_HEADER: &str = "X-Data-Source";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Cache,
    Fresh,
    FallbackCache,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Cache => "cache",
            DataSource::Fresh => "fresh",
            DataSource::FallbackCache => "fallback-cache",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatsQuery {
    time_range: Option<String>,
    start_timestamp: Option<String>,
    end_timestamp: Option<String>,
    metrics: Option<String>,
    clear_cache: Option<String>,
}

impl ChainStatsQuery {
    fn params(&self) -> ChainStatsParams {
        ChainStatsParams {
            time_range: self.time_range.to_owned(),
            start_timestamp: self.start_timestamp.to_owned(),
            end_timestamp: self.end_timestamp.to_owned(),
            metrics: self.metrics.to_owned(),
        }
    }

    fn clear_cache(&self) -> bool {
        self.clear_cache.as_deref() == Some("true")
    }
}

#[get("/chain-stats/{scope}")]
pub async fn chain_stats(
    state: web::Data<AppState<State>>,
    path: web::Path<String>,
    query: web::Query<ChainStatsQuery>,
) -> Result<HttpResponse, Error> {
    let scope = path.into_inner();
    let request = parse_metric_request(&scope, &query.params())?;

    if query.clear_cache() {
        state.api_cache.chain_stats.clear().await;
        info!("Chain stats cache cleared by request for {}", scope);
    }

    let key = CacheKey::for_request(&request).to_string();
    let started = Instant::now();

    if let Some(entry) = state.api_cache.chain_stats.get_fresh(&key).await {
        debug!("Cache hit: {}", key);
        let entry = refresh_auxiliary(&state, &request, entry).await;
        return Ok(respond(
            &state,
            &request,
            DataSource::Cache,
            &entry,
            started.elapsed(),
        ));
    }

    match aggregate(&state, &request).await {
        Ok(entry) => {
            info!(
                "Fetched {} in {}ms",
                key,
                started.elapsed().as_millis()
            );
            Ok(respond(
                &state,
                &request,
                DataSource::Fresh,
                &entry,
                started.elapsed(),
            ))
        },
        Err(e) => {
            error!("Aggregation failed for {}: {}", key, e);

            let fallback_key = CacheKey::fallback_for(&request).to_string();
            if let Some(entry) =
                state.api_cache.chain_stats.get(&fallback_key).await
            {
                info!("Serving fallback entry {} for {}", fallback_key, key);
                return Ok(respond(
                    &state,
                    &request,
                    DataSource::FallbackCache,
                    &entry,
                    started.elapsed(),
                ));
            }

            Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to fetch chain stats",
                "details": e.to_string(),
                "chainId": scope,
                "timeRange": time_range_label(&request.window),
            })))
        },
    }
}

fn respond(
    state: &State,
    request: &MetricRequest,
    source: DataSource,
    entry: &CacheEntry<ChainStatsPayload>,
    elapsed: Duration,
) -> HttpResponse {
    let (status, cache_control) = match source {
        DataSource::FallbackCache => {
            (StatusCode::PARTIAL_CONTENT, String::from("no-cache"))
        },
        _ => (
            StatusCode::OK,
            format!(
                "public, max-age={}",
                state.api_cache.chain_stats.ttl().as_secs()
            ),
        ),
    };

    let mut response = HttpResponse::build(status);
    response
        .insert_header((DATA_SOURCE_HEADER, source.as_str()))
        .insert_header(("X-Cache-Timestamp", entry.fetched_at.to_rfc3339()))
        .insert_header(("X-Fetch-Duration", format!("{}ms", elapsed.as_millis())))
        .insert_header(("X-Chain-Id", request.scope.to_string()))
        .insert_header(("X-Time-Range", time_range_label(&request.window)))
        .insert_header(("X-Metrics", request.metrics_label()))
        .insert_header(("Cache-Control", cache_control));

    // Only caller supplied timestamps are echoed.
    if let Window::Explicit { start, end } = request.window {
        response
            .insert_header(("X-Start-Timestamp", start.to_string()))
            .insert_header(("X-End-Timestamp", end.to_string()));
    }

    response.json(&entry.payload)
}

fn time_range_label(window: &Window) -> String {
    match window {
        Window::Relative(range) => range.as_str().to_owned(),
        Window::Explicit { .. } => String::from("custom"),
    }
}
