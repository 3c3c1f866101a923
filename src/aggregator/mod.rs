//! Metric aggregation
//!
//! Fans a `MetricRequest` out into one fetch task per requested metric,
//! joins them and stores the combined payload under the request's key.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::info;

use crate::{
    cache::CacheEntry,
    cache_keys::CacheKey,
    configuration::{Config, State},
    error::Error,
    helpers::resolve_series_window,
    provider::Upstream,
    types::{
        ActiveAddressesSeries, ChainStatsPayload, IcmSeries, MetricName,
        MetricRequest, MetricSeries, MetricValue, TimeInterval, Window,
    },
};

use self::fetchers::{Paging, SeriesWindow};

pub mod explorer;
pub mod fetchers;

enum FetchOutput {
    Series(MetricName, MetricSeries),
    ActiveAddresses(TimeInterval, MetricSeries),
    Icm(IcmSeries),
}

/// Fetches every requested metric concurrently, writes the assembled
/// payload to the chain stats cache and returns the stored entry.
pub async fn aggregate(
    state: &State,
    request: &MetricRequest,
) -> Result<CacheEntry<ChainStatsPayload>, Error> {
    let payload = collect(state.upstream.clone(), &state.config, request).await?;
    let key = CacheKey::for_request(request).to_string();
    let entry = CacheEntry::new(payload, auxiliary_tag(request));

    state.api_cache.chain_stats.set(&key, entry.clone()).await;

    Ok(entry)
}

/// Re-fetches the interchain message sub-metric of a cache hit when the
/// entry was populated for a different window, leaving the other metrics
/// untouched.
pub async fn refresh_auxiliary(
    state: &State,
    request: &MetricRequest,
    entry: CacheEntry<ChainStatsPayload>,
) -> CacheEntry<ChainStatsPayload> {
    let tag = match auxiliary_tag(request) {
        Some(tag) => tag,
        None => return entry,
    };

    if entry.auxiliary_window_tag.as_deref() == Some(tag.as_str()) {
        return entry;
    }

    info!(
        "Refreshing icmMessages for {} ({:?} -> {})",
        request.scope, entry.auxiliary_window_tag, tag
    );

    let points = fetchers::fetch_icm_messages(
        state.upstream.as_ref(),
        &request.scope,
        &request.window,
    )
    .await;
    let icm = MetricValue::Icm(IcmSeries::from_points(points));

    let key = CacheKey::for_request(request).to_string();
    let patched = state
        .api_cache
        .chain_stats
        .patch(&key, |cached| {
            cached.payload.insert(MetricName::IcmMessages, icm.clone());
            cached.auxiliary_window_tag = Some(tag.clone());
        })
        .await;

    match patched {
        Some(patched) => patched,
        None => {
            let mut entry = entry;
            entry.payload.insert(MetricName::IcmMessages, icm);
            entry.auxiliary_window_tag = Some(tag);
            entry
        },
    }
}

fn auxiliary_tag(request: &MetricRequest) -> Option<String> {
    if request.wants(MetricName::IcmMessages) {
        return Some(request.window.tag());
    }
    None
}

async fn collect(
    upstream: Arc<dyn Upstream>,
    config: &Config,
    request: &MetricRequest,
) -> Result<ChainStatsPayload, Error> {
    let (start, end) =
        resolve_series_window(&request.window, config.rolling_window_days);
    let window = SeriesWindow { start, end };
    let paging = Paging {
        page_size: config.metric_page_size,
        exhaustive: config.metric_fetch_all_pages,
    };

    let mut set = JoinSet::new();

    for metric in request.metrics() {
        match metric {
            MetricName::ActiveAddresses => {
                let intervals: &[TimeInterval] = if request.fetch_everything() {
                    &[TimeInterval::Day, TimeInterval::Week, TimeInterval::Month]
                } else {
                    &[TimeInterval::Day]
                };

                for interval in intervals.iter().copied() {
                    let upstream = upstream.clone();
                    let scope = request.scope.clone();
                    set.spawn(async move {
                        let points = fetchers::fetch_active_addresses(
                            upstream.as_ref(),
                            &scope,
                            interval,
                            window,
                            paging.page_size,
                        )
                        .await;
                        FetchOutput::ActiveAddresses(
                            interval,
                            MetricSeries::from_points(points),
                        )
                    });
                }
            },
            MetricName::IcmMessages => {
                let upstream = upstream.clone();
                let scope = request.scope.clone();
                let icm_window: Window = request.window;
                set.spawn(async move {
                    let points = fetchers::fetch_icm_messages(
                        upstream.as_ref(),
                        &scope,
                        &icm_window,
                    )
                    .await;
                    FetchOutput::Icm(IcmSeries::from_points(points))
                });
            },
            metric => {
                let upstream = upstream.clone();
                let scope = request.scope.clone();
                set.spawn(async move {
                    let points = fetchers::fetch_time_series(
                        upstream.as_ref(),
                        &scope,
                        metric,
                        TimeInterval::Day,
                        window,
                        paging,
                    )
                    .await;
                    FetchOutput::Series(metric, MetricSeries::from_points(points))
                });
            },
        }
    }

    let mut payload = ChainStatsPayload::new(Utc::now().timestamp_millis());
    let mut daily = None;
    let mut weekly = None;
    let mut monthly = None;

    while let Some(result) = set.join_next().await {
        match result? {
            FetchOutput::Series(metric, series) => {
                payload.insert(metric, MetricValue::Series(series));
            },
            FetchOutput::Icm(series) => {
                payload.insert(MetricName::IcmMessages, MetricValue::Icm(series));
            },
            FetchOutput::ActiveAddresses(TimeInterval::Day, series) => {
                daily = Some(series)
            },
            FetchOutput::ActiveAddresses(TimeInterval::Week, series) => {
                weekly = Some(series)
            },
            FetchOutput::ActiveAddresses(TimeInterval::Month, series) => {
                monthly = Some(series)
            },
        }
    }

    if request.wants(MetricName::ActiveAddresses) {
        let daily = daily.unwrap_or_else(MetricSeries::empty);
        let value = if request.fetch_everything() {
            MetricValue::ActiveAddresses(ActiveAddressesSeries {
                daily,
                weekly: weekly.unwrap_or_else(MetricSeries::empty),
                monthly: monthly.unwrap_or_else(MetricSeries::empty),
            })
        } else {
            MetricValue::Series(daily)
        };
        payload.insert(MetricName::ActiveAddresses, value);
    }

    Ok(payload)
}
