//! Upstream fetchers
//!
//! Each fetcher wraps one upstream call contract and never fails: an
//! upstream error is logged and turned into an empty result, so one
//! metric cannot abort a whole aggregation.

use chrono::Utc;
use tracing::warn;

use crate::{
    helpers::SECONDS_PER_DAY,
    provider::{MetricPageQuery, Upstream},
    types::{
        format_date, CoinGeckoPriceData, IcmDataPoint, MetricName, MetricSeries,
        RpcBlock, RpcReceipt, Scope, TimeInterval, TimeSeriesDataPoint, Window,
        MAX_ICM_DAYS,
    },
};

/// Hard stop for exhaustive paging.
const MAX_PAGES: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct SeriesWindow {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub page_size: u32,
    pub exhaustive: bool,
}

/// Fetches one metric as a newest-first point list.
pub async fn fetch_time_series(
    upstream: &dyn Upstream,
    scope: &Scope,
    metric: MetricName,
    interval: TimeInterval,
    window: SeriesWindow,
    paging: Paging,
) -> Vec<TimeSeriesDataPoint> {
    let mut query = MetricPageQuery {
        chain: scope.upstream_token().to_owned(),
        metric,
        interval,
        start: window.start,
        end: window.end,
        page_size: paging.page_size,
        page_token: None,
    };
    let mut points = vec![];

    for _ in 0..MAX_PAGES {
        let page = match upstream.metric_page(&query).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    "{} ({}) fetch failed for {}: {}",
                    metric,
                    interval.as_str(),
                    scope,
                    e
                );
                return vec![];
            },
        };

        points.extend(
            page.results
                .into_iter()
                .map(|p| TimeSeriesDataPoint::new(p.timestamp, p.value)),
        );

        match page.next_page_token {
            Some(token) if paging.exhaustive => query.page_token = Some(token),
            _ => break,
        }
    }

    points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    points
}

pub async fn fetch_active_addresses(
    upstream: &dyn Upstream,
    scope: &Scope,
    interval: TimeInterval,
    window: SeriesWindow,
    page_size: u32,
) -> Vec<TimeSeriesDataPoint> {
    fetch_time_series(
        upstream,
        scope,
        MetricName::ActiveAddresses,
        interval,
        window,
        Paging {
            page_size,
            exhaustive: true,
        },
    )
    .await
}

/// Day count covering `window` for the day-keyed message indexer.
pub fn icm_days(window: &Window, now: i64) -> u32 {
    match window {
        Window::Relative(range) => range.days(),
        Window::Explicit { start, .. } => {
            let span = now.saturating_sub(*start).max(0);
            let days =
                span.saturating_add(SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
            days.clamp(1, MAX_ICM_DAYS as i64) as u32
        },
    }
}

/// Interchain message counts, newest first. Explicit windows are filtered
/// client side because the day-count granularity can overshoot them.
pub async fn fetch_icm_messages(
    upstream: &dyn Upstream,
    scope: &Scope,
    window: &Window,
) -> Vec<IcmDataPoint> {
    let days = icm_days(window, Utc::now().timestamp());

    let points = match upstream
        .icm_daily_counts(scope.upstream_token(), days)
        .await
    {
        Ok(points) => points,
        Err(e) => {
            warn!("icmMessages fetch failed for {}: {}", scope, e);
            return vec![];
        },
    };

    let mut points: Vec<IcmDataPoint> = points
        .into_iter()
        .filter(|p| match window {
            Window::Explicit { start, end } => {
                p.timestamp >= *start && p.timestamp <= *end
            },
            Window::Relative(_) => true,
        })
        .map(|mut p| {
            if p.date.is_empty() {
                p.date = format_date(p.timestamp);
            }
            p
        })
        .collect();

    points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    points
}

/// Newest `cumulativeTxCount` value for a chain.
pub async fn fetch_total_transactions(
    upstream: &dyn Upstream,
    scope: &Scope,
) -> Option<f64> {
    let end = Utc::now().timestamp();
    let points = fetch_time_series(
        upstream,
        scope,
        MetricName::CumulativeTxCount,
        TimeInterval::Day,
        SeriesWindow {
            start: end - 7 * SECONDS_PER_DAY,
            end,
        },
        Paging {
            page_size: 7,
            exhaustive: false,
        },
    )
    .await;

    let series = MetricSeries::from_points(points);
    series.data.first().map(|p| p.value)
}

pub async fn fetch_block(
    upstream: &dyn Upstream,
    rpc_url: &str,
    number: u64,
) -> Option<RpcBlock> {
    match upstream.block_by_number(rpc_url, number).await {
        Ok(block) => block,
        Err(e) => {
            warn!("block {} fetch failed: {}", number, e);
            None
        },
    }
}

pub async fn fetch_receipt(
    upstream: &dyn Upstream,
    rpc_url: &str,
    hash: &str,
) -> Option<RpcReceipt> {
    match upstream.transaction_receipt(rpc_url, hash).await {
        Ok(receipt) => receipt,
        Err(e) => {
            warn!("receipt {} fetch failed: {}", hash, e);
            None
        },
    }
}

pub async fn fetch_price(
    upstream: &dyn Upstream,
    coingecko_id: &str,
) -> Option<CoinGeckoPriceData> {
    match upstream.token_price(coingecko_id).await {
        Ok(price) => price,
        Err(e) => {
            warn!("price fetch failed for {}: {}", coingecko_id, e);
            None
        },
    }
}

pub async fn fetch_glacier_support(
    upstream: &dyn Upstream,
    chain_id: &str,
) -> bool {
    match upstream.glacier_supports_chain(chain_id).await {
        Ok(supported) => supported,
        Err(e) => {
            warn!("glacier support lookup failed for {}: {}", chain_id, e);
            false
        },
    }
}
