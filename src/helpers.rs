use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::Utc;

use crate::{
    error::Error,
    types::{MetricName, MetricRequest, Scope, TimeRange, Window},
};

/// Native token decimals on every EVM chain served here.
pub const NATIVE_DECIMALS: i64 = 18;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Splits `(a,b),(c,d)` into `["a,b", "c,d"]`.
pub fn parse_tuple_string(data: String) -> Vec<String> {
    let trimmed = data.trim();
    let str = trimmed.strip_prefix('(').unwrap_or(trimmed);
    let splited = str.split(",(");
    let mut items: Vec<String> = Vec::new();

    for c in splited {
        if let Some(index) = c.find(')') {
            let tuple_data = &c[0..index];
            items.push(tuple_data.to_owned());
        }
    }

    items
}

pub fn parse_hex_u64(value: &str) -> Result<u64, Error> {
    let digits = value.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|_| Error::ParseHex(value.to_owned()))
}

pub fn parse_hex_u128(value: &str) -> Result<u128, Error> {
    let digits = value.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|_| Error::ParseHex(value.to_owned()))
}

/// Converts an amount in wei to native token units.
pub fn from_wei(amount: u128) -> BigDecimal {
    BigDecimal::new(amount.into(), NATIVE_DECIMALS).normalized()
}

/// Raw query parameters of the chain stats route.
#[derive(Debug, Default, Clone)]
pub struct ChainStatsParams {
    pub time_range: Option<String>,
    pub start_timestamp: Option<String>,
    pub end_timestamp: Option<String>,
    pub metrics: Option<String>,
}

/// Validates the raw parameters and builds the normalized request.
/// Nothing is fetched before this succeeds.
pub fn parse_metric_request(
    scope: &str,
    params: &ChainStatsParams,
) -> Result<MetricRequest, Error> {
    let scope = Scope::from_path(scope)?;

    let time_range = match params.time_range.as_deref() {
        Some(value) => TimeRange::from_str(value)?,
        None => TimeRange::default(),
    };

    let start = parse_timestamp("startTimestamp", &params.start_timestamp)?;
    let end = parse_timestamp("endTimestamp", &params.end_timestamp)?;

    let window = match (start, end) {
        (Some(start), Some(end)) => {
            if start > end {
                return Err(Error::InvalidRange { start, end });
            }
            Window::Explicit { start, end }
        },
        (None, None) => Window::Relative(time_range),
        _ => {
            return Err(Error::MissingParams(String::from(
                "startTimestamp and endTimestamp must be supplied together",
            )));
        },
    };

    let requested_metrics = match params.metrics.as_deref() {
        Some(value) => Some(MetricName::parse_list(value)?),
        None => None,
    };

    Ok(MetricRequest::new(scope, window, requested_metrics))
}

fn parse_timestamp(
    name: &str,
    value: &Option<String>,
) -> Result<Option<i64>, Error> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse::<i64>().map(Some).map_err(|_| {
            Error::InvalidTimestamp {
                name: name.to_owned(),
                value: v.to_owned(),
            }
        }),
    }
}

/// Absolute `[start, end]` the time-series metrics are fetched over.
pub fn resolve_series_window(window: &Window, rolling_days: i64) -> (i64, i64) {
    match window {
        Window::Explicit { start, end } => (*start, *end),
        Window::Relative(_) => {
            let now = Utc::now().timestamp();
            (now - rolling_days * SECONDS_PER_DAY, now)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(
        time_range: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
        metrics: Option<&str>,
    ) -> ChainStatsParams {
        ChainStatsParams {
            time_range: time_range.map(str::to_owned),
            start_timestamp: start.map(str::to_owned),
            end_timestamp: end.map(str::to_owned),
            metrics: metrics.map(str::to_owned),
        }
    }

    #[test]
    fn test_parse_tuple_string() {
        let items = parse_tuple_string(String::from("(a,b),(c,d)"));
        assert_eq!(items, vec!["a,b", "c,d"]);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex_u64("0x1a").unwrap(), 26);
        assert_eq!(parse_hex_u64("0x").unwrap(), 0);
        assert_eq!(parse_hex_u128("0x3b9aca00").unwrap(), 1_000_000_000);
        assert!(matches!(parse_hex_u64("0xzz"), Err(Error::ParseHex(_))));
    }

    #[test]
    fn test_from_wei() {
        let one_and_half = 1_500_000_000_000_000_000u128;
        assert_eq!(from_wei(one_and_half).to_string(), "1.5");
    }

    #[test]
    fn test_default_request() {
        let request =
            parse_metric_request("43114", &ChainStatsParams::default())
                .unwrap();
        assert_eq!(request.window, Window::Relative(TimeRange::ThirtyDays));
        assert!(request.fetch_everything());
    }

    #[test]
    fn test_explicit_pair_wins_over_time_range() {
        let request = parse_metric_request(
            "43114",
            &params(Some("7d"), Some("100"), Some("200"), None),
        )
        .unwrap();
        assert_eq!(
            request.window,
            Window::Explicit {
                start: 100,
                end: 200
            }
        );
    }

    #[test]
    fn test_rejects_inverted_range() {
        let err = parse_metric_request(
            "43114",
            &params(None, Some("300"), Some("200"), None),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRange { start: 300, end: 200 }));
    }

    #[test]
    fn test_rejects_non_numeric_timestamp() {
        let err = parse_metric_request(
            "43114",
            &params(None, Some("yesterday"), Some("200"), None),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_rejects_scope_with_url_syntax() {
        let err = parse_metric_request("..", &ChainStatsParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidScope(_)));
    }

    #[test]
    fn test_rejects_half_pair() {
        let err =
            parse_metric_request("43114", &params(None, Some("1"), None, None))
                .unwrap_err();
        assert!(matches!(err, Error::MissingParams(_)));
    }

    #[test]
    fn test_rejects_unknown_metric_and_time_range() {
        assert!(matches!(
            parse_metric_request(
                "43114",
                &params(None, None, None, Some("txCount,bogus"))
            ),
            Err(Error::InvalidMetrics(_))
        ));
        assert!(matches!(
            parse_metric_request("43114", &params(Some("2w"), None, None, None)),
            Err(Error::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_resolve_series_window() {
        let explicit = Window::Explicit { start: 5, end: 10 };
        assert_eq!(resolve_series_window(&explicit, 365), (5, 10));

        let (start, end) =
            resolve_series_window(&Window::Relative(TimeRange::All), 2);
        assert_eq!(end - start, 2 * SECONDS_PER_DAY);
    }
}
