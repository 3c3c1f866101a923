//! Cache key composition
//!
//! Keys are derived from the normalized request so that logically
//! identical requests share one slot regardless of metric order.

use std::fmt;

use crate::types::{MetricRequest, Scope, Window};

/// Window component shared by every relative (named) time range.
pub const ROLLING_WINDOW: &str = "rolling";

pub const EXPLORER_PREFIX: &str = "explorer";
pub const GLACIER_SUPPORT_PREFIX: &str = "glacier_support";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: String,
    pub window: String,
    pub metrics: String,
}

impl CacheKey {
    pub fn for_request(request: &MetricRequest) -> CacheKey {
        let window = match request.window {
            Window::Relative(_) => ROLLING_WINDOW.to_owned(),
            Window::Explicit { start, end } => format!("{}-{}", start, end),
        };

        CacheKey {
            scope: request.scope.to_string(),
            window,
            metrics: request.metrics_label(),
        }
    }

    /// Key of the default-window entry served when an aggregation fails.
    pub fn fallback_for(request: &MetricRequest) -> CacheKey {
        CacheKey {
            window: ROLLING_WINDOW.to_owned(),
            ..CacheKey::for_request(request)
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scope, self.window, self.metrics)
    }
}

pub fn explorer_key(scope: &Scope) -> String {
    format!("{}:{}", EXPLORER_PREFIX, scope)
}

pub fn glacier_support_key(chain_id: &str) -> String {
    format!("{}:{}", GLACIER_SUPPORT_PREFIX, chain_id)
}
