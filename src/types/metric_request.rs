use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Scope token the metrics API expects for the cross-chain aggregate view.
pub const AGGREGATE_SCOPE_TOKEN: &str = "mainnet";

/// Scope sentinel accepted on the HTTP surface.
pub const ALL_CHAINS: &str = "all";

/// Upper bound for the interchain message indexer's `days` parameter.
pub const MAX_ICM_DAYS: u32 = 365;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum MetricName {
    ActiveAddresses,
    ActiveSenders,
    CumulativeAddresses,
    CumulativeDeployers,
    TxCount,
    CumulativeTxCount,
    CumulativeContracts,
    Contracts,
    Deployers,
    GasUsed,
    AvgGps,
    MaxGps,
    AvgTps,
    MaxTps,
    AvgGasPrice,
    MaxGasPrice,
    FeesPaid,
    IcmMessages,
}

impl MetricName {
    pub const ALL: [MetricName; 18] = [
        MetricName::ActiveAddresses,
        MetricName::ActiveSenders,
        MetricName::CumulativeAddresses,
        MetricName::CumulativeDeployers,
        MetricName::TxCount,
        MetricName::CumulativeTxCount,
        MetricName::CumulativeContracts,
        MetricName::Contracts,
        MetricName::Deployers,
        MetricName::GasUsed,
        MetricName::AvgGps,
        MetricName::MaxGps,
        MetricName::AvgTps,
        MetricName::MaxTps,
        MetricName::AvgGasPrice,
        MetricName::MaxGasPrice,
        MetricName::FeesPaid,
        MetricName::IcmMessages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ActiveAddresses => "activeAddresses",
            MetricName::ActiveSenders => "activeSenders",
            MetricName::CumulativeAddresses => "cumulativeAddresses",
            MetricName::CumulativeDeployers => "cumulativeDeployers",
            MetricName::TxCount => "txCount",
            MetricName::CumulativeTxCount => "cumulativeTxCount",
            MetricName::CumulativeContracts => "cumulativeContracts",
            MetricName::Contracts => "contracts",
            MetricName::Deployers => "deployers",
            MetricName::GasUsed => "gasUsed",
            MetricName::AvgGps => "avgGps",
            MetricName::MaxGps => "maxGps",
            MetricName::AvgTps => "avgTps",
            MetricName::MaxTps => "maxTps",
            MetricName::AvgGasPrice => "avgGasPrice",
            MetricName::MaxGasPrice => "maxGasPrice",
            MetricName::FeesPaid => "feesPaid",
            MetricName::IcmMessages => "icmMessages",
        }
    }

    pub fn tokens() -> Vec<&'static str> {
        Self::ALL.iter().map(MetricName::as_str).collect()
    }

    /// Parses a comma separated token list, collecting every unknown token.
    pub fn parse_list(value: &str) -> Result<BTreeSet<MetricName>, Error> {
        let mut metrics = BTreeSet::new();
        let mut invalid = vec![];

        for token in value.split(',').map(str::trim).filter(|t| !t.is_empty())
        {
            match MetricName::from_str(token) {
                Ok(metric) => {
                    metrics.insert(metric);
                },
                Err(_) => invalid.push(token.to_owned()),
            }
        }

        if !invalid.is_empty() {
            return Err(Error::InvalidMetrics(invalid));
        }

        if metrics.is_empty() {
            return Err(Error::MissingParams(String::from(
                "metrics must name at least one metric",
            )));
        }

        Ok(metrics)
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MetricName {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MetricName::ALL
            .iter()
            .find(|metric| metric.as_str() == value)
            .copied()
            .ok_or_else(|| Error::InvalidMetrics(vec![value.to_owned()]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeInterval {
    Day,
    Week,
    Month,
}

impl TimeInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInterval::Day => "day",
            TimeInterval::Week => "week",
            TimeInterval::Month => "month",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeRange {
    SevenDays,
    #[default]
    ThirtyDays,
    NinetyDays,
    OneYear,
    All,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::SevenDays => "7d",
            TimeRange::ThirtyDays => "30d",
            TimeRange::NinetyDays => "90d",
            TimeRange::OneYear => "1y",
            TimeRange::All => "all",
        }
    }

    /// Day count handed to the interchain message indexer.
    pub fn days(&self) -> u32 {
        match self {
            TimeRange::SevenDays => 7,
            TimeRange::ThirtyDays => 30,
            TimeRange::NinetyDays => 90,
            TimeRange::OneYear | TimeRange::All => MAX_ICM_DAYS,
        }
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "7d" => Ok(TimeRange::SevenDays),
            "30d" => Ok(TimeRange::ThirtyDays),
            "90d" => Ok(TimeRange::NinetyDays),
            "1y" => Ok(TimeRange::OneYear),
            "all" => Ok(TimeRange::All),
            v => Err(Error::InvalidOption {
                option: format!(
                    "timeRange '{}'. Valid options: 7d, 30d, 90d, 1y, all",
                    v
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    All,
    Chain(String),
}

impl Scope {
    pub fn parse(value: &str) -> Scope {
        if value.eq_ignore_ascii_case(ALL_CHAINS) {
            return Scope::All;
        }
        Scope::Chain(value.to_owned())
    }

    /// Parses a scope taken from a request path. Chain identifiers are
    /// restricted to `[A-Za-z0-9_-]` since they are sent on to upstream
    /// URLs.
    pub fn from_path(value: &str) -> Result<Scope, Error> {
        let valid = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if !valid {
            return Err(Error::InvalidScope(value.to_owned()));
        }

        Ok(Scope::parse(value))
    }

    /// Identifier sent to the metrics API and the indexer.
    pub fn upstream_token(&self) -> &str {
        match self {
            Scope::All => AGGREGATE_SCOPE_TOKEN,
            Scope::Chain(id) => id,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scope::All => write!(f, "{}", ALL_CHAINS),
            Scope::Chain(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Relative(TimeRange),
    Explicit { start: i64, end: i64 },
}

impl Window {
    /// Tag recorded for the interchain message sub-metric of a cache entry.
    pub fn tag(&self) -> String {
        match self {
            Window::Relative(range) => range.as_str().to_owned(),
            Window::Explicit { start, end } => format!("{}-{}", start, end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRequest {
    pub scope: Scope,
    pub window: Window,
    /// `None` selects every metric in the vocabulary.
    pub requested_metrics: Option<BTreeSet<MetricName>>,
}

impl MetricRequest {
    pub fn new(
        scope: Scope,
        window: Window,
        requested_metrics: Option<BTreeSet<MetricName>>,
    ) -> MetricRequest {
        MetricRequest {
            scope,
            window,
            requested_metrics,
        }
    }

    pub fn fetch_everything(&self) -> bool {
        self.requested_metrics.is_none()
    }

    pub fn metrics(&self) -> BTreeSet<MetricName> {
        match &self.requested_metrics {
            Some(metrics) => metrics.clone(),
            None => MetricName::ALL.into_iter().collect(),
        }
    }

    pub fn wants(&self, metric: MetricName) -> bool {
        match &self.requested_metrics {
            Some(metrics) => metrics.contains(&metric),
            None => true,
        }
    }

    pub fn metrics_label(&self) -> String {
        match &self.requested_metrics {
            Some(metrics) => metrics
                .iter()
                .map(MetricName::as_str)
                .collect::<Vec<&str>>()
                .join(","),
            None => String::from("all"),
        }
    }
}
