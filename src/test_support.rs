//! In-process `Upstream` double used by aggregator and route tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    configuration::{AppState, ChainConfig, Config, State},
    error::Error,
    helpers::SECONDS_PER_DAY,
    provider::{MetricPageQuery, Upstream},
    types::{
        CoinGeckoPriceData, IcmDataPoint, MetricPage, MetricPoint, RpcBlock,
        RpcLog, RpcReceipt, RpcTransaction,
    },
};

pub const SEND_TOPIC: &str =
    "0x2a211ad4a59ab9d003852404f9c57c690704ee755f3c79d2c2812ad32da99df8";

/// Latest block served by the fake RPC node.
pub const LATEST_BLOCK: u64 = 100;

/// Gas price of every fake transaction: 25 gwei.
pub const GAS_PRICE: u128 = 25_000_000_000;
pub const GAS_USED: u128 = 21_000;

#[derive(Default)]
pub struct FakeUpstream {
    pub metric_queries: Mutex<Vec<MetricPageQuery>>,
    pub icm_calls: Mutex<Vec<(String, u32)>>,
    pub receipt_calls: AtomicUsize,
    pub glacier_calls: AtomicUsize,
    /// Serve two pages per series, linked by a page token.
    pub paged: AtomicBool,
    pub fail_metrics: AtomicBool,
    pub panic_metrics: AtomicBool,
    pub fail_icm: AtomicBool,
    pub fail_rpc: AtomicBool,
    pub glacier_supported: AtomicBool,
    /// Report `u128::MAX` gas used on every receipt.
    pub max_gas_used: AtomicBool,
    pub price: Mutex<Option<CoinGeckoPriceData>>,
    /// Overrides the generated ICM points when set.
    pub icm_points: Mutex<Option<Vec<IcmDataPoint>>>,
}

impl FakeUpstream {
    pub fn new() -> Arc<FakeUpstream> {
        Arc::new(FakeUpstream::default())
    }

    pub fn metric_call_count(&self) -> usize {
        self.metric_queries.lock().unwrap().len()
    }

    pub fn icm_call_count(&self) -> usize {
        self.icm_calls.lock().unwrap().len()
    }

    pub fn total_calls(&self) -> usize {
        self.metric_call_count() + self.icm_call_count()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn metric_page(
        &self,
        query: &MetricPageQuery,
    ) -> Result<MetricPage, Error> {
        self.metric_queries.lock().unwrap().push(query.clone());

        if self.panic_metrics.load(Ordering::SeqCst) {
            panic!("metrics upstream exploded");
        }

        if self.fail_metrics.load(Ordering::SeqCst) {
            return Err(Error::UpstreamStatus {
                status: 503,
                url: String::from("/metrics"),
            });
        }

        let base = query.metric as usize as f64;
        let paged = self.paged.load(Ordering::SeqCst);
        let (offset, next_page_token) = match (&query.page_token, paged) {
            (None, true) => (0, Some(String::from("page-2"))),
            (Some(_), _) => (2, None),
            (None, false) => (0, None),
        };

        let results = (offset..offset + 2)
            .map(|i| MetricPoint {
                timestamp: query.start + i * SECONDS_PER_DAY,
                value: base + i as f64,
            })
            .collect();

        Ok(MetricPage {
            results,
            next_page_token,
        })
    }

    async fn icm_daily_counts(
        &self,
        chain: &str,
        days: u32,
    ) -> Result<Vec<IcmDataPoint>, Error> {
        self.icm_calls
            .lock()
            .unwrap()
            .push((chain.to_owned(), days));

        if self.fail_icm.load(Ordering::SeqCst) {
            return Err(Error::UpstreamStatus {
                status: 500,
                url: String::from("/icm"),
            });
        }

        if let Some(points) = self.icm_points.lock().unwrap().clone() {
            return Ok(points);
        }

        let now = Utc::now().timestamp();
        Ok((0..days as i64)
            .map(|day| IcmDataPoint {
                timestamp: now - day * SECONDS_PER_DAY,
                date: String::new(),
                message_count: days as u64,
                incoming_count: 0,
                outgoing_count: days as u64,
            })
            .collect())
    }

    async fn glacier_supports_chain(&self, _chain_id: &str) -> Result<bool, Error> {
        self.glacier_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.glacier_supported.load(Ordering::SeqCst))
    }

    async fn token_price(
        &self,
        _coingecko_id: &str,
    ) -> Result<Option<CoinGeckoPriceData>, Error> {
        Ok(self.price.lock().unwrap().clone())
    }

    async fn block_number(&self, _rpc_url: &str) -> Result<u64, Error> {
        if self.fail_rpc.load(Ordering::SeqCst) {
            return Err(Error::RpcError {
                code: -32000,
                message: String::from("node unavailable"),
            });
        }
        Ok(LATEST_BLOCK)
    }

    /// Block `n` is stamped `1000 + 2n` and carries two transactions.
    async fn block_by_number(
        &self,
        _rpc_url: &str,
        number: u64,
    ) -> Result<Option<RpcBlock>, Error> {
        let transactions = (0..2)
            .map(|i| RpcTransaction {
                hash: tx_hash(number, i),
                from: String::from("0xsender"),
                to: Some(String::from("0xreceiver")),
                value: String::from("0xde0b6b3a7640000"),
                gas_price: Some(format!("0x{:x}", GAS_PRICE)),
            })
            .collect();

        Ok(Some(RpcBlock {
            number: format!("0x{:x}", number),
            hash: format!("0xblock{}", number),
            timestamp: format!("0x{:x}", 1000 + 2 * number),
            miner: String::from("0xminer"),
            gas_used: format!("0x{:x}", GAS_USED * 2),
            gas_limit: String::from("0xe4e1c0"),
            base_fee_per_gas: Some(format!("0x{:x}", GAS_PRICE)),
            transactions,
        }))
    }

    /// The first transaction of every even block emits a send event.
    async fn transaction_receipt(
        &self,
        _rpc_url: &str,
        hash: &str,
    ) -> Result<Option<RpcReceipt>, Error> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);

        let cross_chain = parse_tx_hash(hash)
            .map(|(block, index)| block % 2 == 0 && index == 0)
            .unwrap_or(false);
        let logs = if cross_chain {
            vec![RpcLog {
                address: String::from("0xteleporter"),
                topics: vec![String::from(SEND_TOPIC)],
            }]
        } else {
            vec![]
        };

        let gas_used = if self.max_gas_used.load(Ordering::SeqCst) {
            u128::MAX
        } else {
            GAS_USED
        };

        Ok(Some(RpcReceipt {
            transaction_hash: hash.to_owned(),
            gas_used: format!("0x{:x}", gas_used),
            effective_gas_price: Some(format!("0x{:x}", GAS_PRICE)),
            status: Some(String::from("0x1")),
            logs,
        }))
    }
}

pub fn tx_hash(block: u64, index: u64) -> String {
    format!("0x{}-{}", block, index)
}

fn parse_tx_hash(hash: &str) -> Option<(u64, u64)> {
    let (block, index) = hash.trim_start_matches("0x").split_once('-')?;
    Some((block.parse().ok()?, index.parse().ok()?))
}

pub fn test_config() -> Config {
    Config::default().with_chains(vec![
        ChainConfig {
            chain_id: String::from("43114"),
            name: String::from("Avalanche C-Chain"),
            rpc_url: Some(String::from("http://rpc.test")),
            coingecko_id: Some(String::from("avalanche-2")),
            symbol: String::from("AVAX"),
        },
        ChainConfig {
            chain_id: String::from("555"),
            name: String::from("No RPC"),
            rpc_url: None,
            coingecko_id: None,
            symbol: String::from("NRP"),
        },
    ])
}

pub fn test_state(
    config: Config,
    upstream: Arc<FakeUpstream>,
) -> AppState<State> {
    AppState::new(State::new(config, upstream))
}
