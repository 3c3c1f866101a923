//! Background cache warm-up task
//!
//! Periodically aggregates the default request (rolling window, every
//! metric) for each configured scope, so the fallback entries exist before
//! the first failing request needs one.
//!
//! Configuration (via .env / stats.conf):
//! - CACHE_WARMUP_INTERVAL_SECS: seconds between runs, 0 disables the task
//! - CACHE_WARMUP_SCOPES: comma separated chain ids, `all` for the aggregate

use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::{
    aggregator::aggregate,
    configuration::{AppState, State},
    error::Error,
    types::{MetricRequest, Scope, TimeRange, Window},
};

const MAX_CONCURRENT_WARMUPS: usize = 2;

pub async fn cache_warmup_task(app_state: AppState<State>) -> Result<(), Error> {
    let interval_secs = app_state.config.cache_warmup_interval_secs;
    if interval_secs == 0 {
        info!("Cache warm-up disabled");
        return Ok(());
    }

    info!(
        "Starting cache warm-up task every {}s for {:?}",
        interval_secs, app_state.config.cache_warmup_scopes
    );

    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        ticker.tick().await;
        let (succeeded, failed) = warm_scopes(&app_state).await;
        info!(
            "Cache warm-up complete: {} succeeded, {} failed",
            succeeded, failed
        );
    }
}

/// Aggregates the default request for every configured scope.
/// Returns the number of successful and failed scopes.
pub async fn warm_scopes(app_state: &AppState<State>) -> (usize, usize) {
    let scopes = app_state.config.cache_warmup_scopes.to_owned();

    let results: Vec<_> = stream::iter(scopes)
        .map(|scope| {
            let app_state = app_state.clone();
            async move {
                let request = MetricRequest::new(
                    Scope::parse(&scope),
                    Window::Relative(TimeRange::default()),
                    None,
                );
                let result = aggregate(&app_state, &request).await;
                (scope, result)
            }
        })
        .buffer_unordered(MAX_CONCURRENT_WARMUPS)
        .collect()
        .await;

    let mut success_count = 0;
    let mut failure_count = 0;
    for (scope, result) in results {
        match result {
            Ok(_) => {
                success_count += 1;
                debug!("Warmed chain stats for {}", scope);
            },
            Err(e) => {
                failure_count += 1;
                warn!("Failed to warm chain stats for {}: {}", scope, e);
            },
        }
    }

    (success_count, failure_count)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::{
        cache_keys::CacheKey,
        configuration::Config,
        test_support::{test_config, test_state, FakeUpstream},
    };

    #[tokio::test]
    async fn test_warm_scopes_populates_fallback_keys() {
        let config = Config {
            cache_warmup_scopes: vec![String::from("all"), String::from("43114")],
            ..test_config()
        };
        let app_state = test_state(config, FakeUpstream::new());

        let (succeeded, failed) = warm_scopes(&app_state).await;

        assert_eq!((succeeded, failed), (2, 0));
        for scope in ["all", "43114"] {
            let request = MetricRequest::new(
                Scope::parse(scope),
                Window::Explicit { start: 1, end: 2 },
                None,
            );
            let key = CacheKey::fallback_for(&request).to_string();
            assert_eq!(key, format!("{}:rolling:all", scope));
            assert!(app_state.api_cache.chain_stats.get(&key).await.is_some());
        }
    }

    #[tokio::test]
    async fn test_warm_scopes_counts_failures() {
        let upstream = FakeUpstream::new();
        upstream.panic_metrics.store(true, Ordering::SeqCst);
        let app_state = test_state(test_config(), upstream);

        let (succeeded, failed) = warm_scopes(&app_state).await;

        assert_eq!((succeeded, failed), (0, 1));
        assert!(app_state.api_cache.chain_stats.is_empty().await);
    }

    #[tokio::test]
    async fn test_disabled_task_returns_immediately() {
        let app_state = test_state(test_config(), FakeUpstream::new());
        assert!(cache_warmup_task(app_state).await.is_ok());
    }
}
