use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::{
    configuration::Config,
    error::{self, Error},
    helpers::parse_hex_u64,
    provider::upstream::{MetricPageQuery, Upstream},
    types::{
        CoinGeckoPriceData, CoinGeckoSimplePrice, IcmDataPoint, JsonRpcRequest,
        JsonRpcResponse, MetricPage, RpcBlock, RpcReceipt,
    },
};

const USER_AGENT: &str = "chain-stats";
const GLACIER_API_KEY_HEADER: &str = "x-glacier-api-key";

#[derive(Debug)]
pub struct HTTP {
    pub config: Config,
    pub http: Client,
}

impl HTTP {
    pub fn new(config: Config) -> Result<HTTP, Error> {
        let http = match Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(USER_AGENT)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                return Err(error::Error::ReqwestError(e));
            },
        };

        Ok(HTTP { config, http })
    }

    fn metric_page_url(&self, query: &MetricPageQuery) -> Result<Url, Error> {
        let metric = query.metric.to_string();
        let mut url = endpoint(
            &self.config.metrics_api_url,
            &["v2", "chains", &query.chain, "metrics", &metric],
        )?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("startTimestamp", &query.start.to_string())
                .append_pair("endTimestamp", &query.end.to_string())
                .append_pair("timeInterval", query.interval.as_str())
                .append_pair("pageSize", &query.page_size.to_string());

            if let Some(token) = &query.page_token {
                pairs.append_pair("pageToken", token);
            }

            if let Some(token) = &self.config.metrics_bypass_token {
                pairs.append_pair("rltoken", token);
            }
        }

        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url.path());
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                url: url.path().to_owned(),
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        rpc_url: &str,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, Error> {
        let request = JsonRpcRequest::new(method, params);
        let response = self.http.post(rpc_url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                url: String::from(method),
            });
        }

        let body = response.json::<JsonRpcResponse<T>>().await?;

        if let Some(e) = body.error {
            return Err(Error::RpcError {
                code: e.code,
                message: e.message,
            });
        }

        Ok(body.result)
    }
}

/// Appends `segments` to `base`, percent-encoding each one so that an
/// identifier can never change the path shape or add a query.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, Error> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| {
            Error::ConfigurationError(format!("{} cannot be a base URL", base))
        })?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

#[async_trait]
impl Upstream for HTTP {
    async fn metric_page(
        &self,
        query: &MetricPageQuery,
    ) -> Result<MetricPage, Error> {
        let url = self.metric_page_url(query)?;
        self.get_json::<MetricPage>(url).await
    }

    async fn icm_daily_counts(
        &self,
        chain: &str,
        days: u32,
    ) -> Result<Vec<IcmDataPoint>, Error> {
        let mut url = endpoint(
            &self.config.icm_indexer_url,
            &["api", chain, "messages", "daily-count"],
        )?;
        url.query_pairs_mut().append_pair("days", &days.to_string());

        self.get_json::<Vec<IcmDataPoint>>(url).await
    }

    async fn glacier_supports_chain(&self, chain_id: &str) -> Result<bool, Error> {
        let url =
            endpoint(&self.config.glacier_api_url, &["v1", "chains", chain_id])?;

        let mut request = self.http.get(url.clone());
        if let Some(key) = &self.config.glacier_api_key {
            request = request.header(GLACIER_API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(Error::UpstreamStatus {
                status: status.as_u16(),
                url: url.path().to_owned(),
            }),
        }
    }

    async fn token_price(
        &self,
        coingecko_id: &str,
    ) -> Result<Option<CoinGeckoPriceData>, Error> {
        let mut url = endpoint(
            &self.config.coingecko_api_url,
            &["api", "v3", "simple", "price"],
        )?;
        url.query_pairs_mut()
            .append_pair("ids", coingecko_id)
            .append_pair("vs_currencies", "usd")
            .append_pair("include_24hr_change", "true")
            .append_pair("include_market_cap", "true");

        let mut prices = self.get_json::<CoinGeckoSimplePrice>(url).await?;
        Ok(prices.remove(coingecko_id))
    }

    async fn block_number(&self, rpc_url: &str) -> Result<u64, Error> {
        let result = self
            .rpc_call::<String>(rpc_url, "eth_blockNumber", json!([]))
            .await?
            .ok_or_else(|| {
                Error::ServerError(String::from("eth_blockNumber: empty result"))
            })?;

        parse_hex_u64(&result)
    }

    async fn block_by_number(
        &self,
        rpc_url: &str,
        number: u64,
    ) -> Result<Option<RpcBlock>, Error> {
        self.rpc_call::<RpcBlock>(
            rpc_url,
            "eth_getBlockByNumber",
            json!([format!("0x{:x}", number), true]),
        )
        .await
    }

    async fn transaction_receipt(
        &self,
        rpc_url: &str,
        hash: &str,
    ) -> Result<Option<RpcReceipt>, Error> {
        self.rpc_call::<RpcReceipt>(
            rpc_url,
            "eth_getTransactionReceipt",
            json!([hash]),
        )
        .await
    }
}
