use std::collections::BTreeMap;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::types::MetricName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesDataPoint {
    pub timestamp: i64,
    pub value: f64,
    pub date: String,
}

impl TimeSeriesDataPoint {
    pub fn new(timestamp: i64, value: f64) -> TimeSeriesDataPoint {
        TimeSeriesDataPoint {
            timestamp,
            value,
            date: format_date(timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IcmDataPoint {
    pub timestamp: i64,
    #[serde(default)]
    pub date: String,
    pub message_count: u64,
    #[serde(default)]
    pub incoming_count: u64,
    #[serde(default)]
    pub outgoing_count: u64,
}

/// Latest value, day-over-day change, trend and total of a newest-first
/// value sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub current_value: f64,
    pub change_24h: f64,
    pub change_percentage_24h: f64,
    pub trend: Trend,
    pub total: f64,
}

impl SeriesSummary {
    fn from_values(values: &[f64]) -> SeriesSummary {
        let current_value = values.first().copied().unwrap_or(0.0);
        let previous = values.get(1).copied().unwrap_or(current_value);
        let change_24h = current_value - previous;
        let change_percentage_24h = if previous != 0.0 {
            change_24h / previous * 100.0
        } else {
            0.0
        };
        let trend = if change_24h > 0.0 {
            Trend::Up
        } else if change_24h < 0.0 {
            Trend::Down
        } else {
            Trend::Flat
        };

        SeriesSummary {
            current_value,
            change_24h,
            change_percentage_24h,
            trend,
            total: values.iter().sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub data: Vec<TimeSeriesDataPoint>,
    #[serde(flatten)]
    pub summary: SeriesSummary,
}

impl MetricSeries {
    pub fn from_points(mut data: Vec<TimeSeriesDataPoint>) -> MetricSeries {
        data.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let values: Vec<f64> = data.iter().map(|p| p.value).collect();

        MetricSeries {
            summary: SeriesSummary::from_values(&values),
            data,
        }
    }

    pub fn empty() -> MetricSeries {
        MetricSeries::from_points(vec![])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IcmSeries {
    pub data: Vec<IcmDataPoint>,
    #[serde(flatten)]
    pub summary: SeriesSummary,
}

impl IcmSeries {
    pub fn from_points(mut data: Vec<IcmDataPoint>) -> IcmSeries {
        data.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let values: Vec<f64> =
            data.iter().map(|p| p.message_count as f64).collect();

        IcmSeries {
            summary: SeriesSummary::from_values(&values),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAddressesSeries {
    pub daily: MetricSeries,
    pub weekly: MetricSeries,
    pub monthly: MetricSeries,
}

/// `ActiveAddresses` only appears when every metric was requested; a
/// request naming `activeAddresses` explicitly gets the flat daily series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Series(MetricSeries),
    ActiveAddresses(ActiveAddressesSeries),
    Icm(IcmSeries),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainStatsPayload {
    #[serde(flatten)]
    pub metrics: BTreeMap<String, MetricValue>,
    pub last_updated: i64,
}

impl ChainStatsPayload {
    pub fn new(last_updated: i64) -> ChainStatsPayload {
        ChainStatsPayload {
            metrics: BTreeMap::new(),
            last_updated,
        }
    }

    pub fn insert(&mut self, metric: MetricName, value: MetricValue) {
        self.metrics.insert(metric.as_str().to_owned(), value);
    }

    pub fn get(&self, metric: MetricName) -> Option<&MetricValue> {
        self.metrics.get(metric.as_str())
    }
}

pub fn format_date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
