use async_trait::async_trait;

use crate::{
    error::Error,
    types::{
        CoinGeckoPriceData, IcmDataPoint, MetricName, MetricPage, RpcBlock,
        RpcReceipt, TimeInterval,
    },
};

/// Query for one page of a metrics API time series.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPageQuery {
    /// Chain id or the aggregate scope token.
    pub chain: String,
    pub metric: MetricName,
    pub interval: TimeInterval,
    pub start: i64,
    pub end: i64,
    pub page_size: u32,
    pub page_token: Option<String>,
}

/// One method per upstream call contract. Every failure is an `Err`;
/// deciding what a failure means is left to the caller.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn metric_page(&self, query: &MetricPageQuery)
        -> Result<MetricPage, Error>;

    /// Daily interchain message counts for the last `days` days.
    async fn icm_daily_counts(
        &self,
        chain: &str,
        days: u32,
    ) -> Result<Vec<IcmDataPoint>, Error>;

    async fn glacier_supports_chain(&self, chain_id: &str) -> Result<bool, Error>;

    async fn token_price(
        &self,
        coingecko_id: &str,
    ) -> Result<Option<CoinGeckoPriceData>, Error>;

    async fn block_number(&self, rpc_url: &str) -> Result<u64, Error>;

    async fn block_by_number(
        &self,
        rpc_url: &str,
        number: u64,
    ) -> Result<Option<RpcBlock>, Error>;

    async fn transaction_receipt(
        &self,
        rpc_url: &str,
        hash: &str,
    ) -> Result<Option<RpcReceipt>, Error>;
}
