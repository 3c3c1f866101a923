use std::collections::HashMap;

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

/// One page of the metrics API time-series endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPage {
    #[serde(default)]
    pub results: Vec<MetricPoint>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricPoint {
    pub timestamp: i64,
    #[serde(deserialize_with = "number_or_string")]
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoinGeckoPriceData {
    pub usd: f64,
    pub usd_24h_change: Option<f64>,
    pub usd_market_cap: Option<f64>,
}

pub type CoinGeckoSimplePrice = HashMap<String, CoinGeckoPriceData>;

/// The metrics API returns large values as decimal strings.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom("value is not representable")),
        Value::String(s) => s.parse::<f64>().map_err(de::Error::custom),
        Value::Null => Ok(0.0),
        other => Err(de::Error::custom(format!(
            "unexpected value type: {}",
            other
        ))),
    }
}
