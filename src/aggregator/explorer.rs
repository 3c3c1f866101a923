//! Explorer snapshot
//!
//! Reads the most recent blocks and their receipts from a chain's RPC
//! node and combines them with the metrics API transaction total and the
//! native token price.

use std::{collections::HashMap, sync::Arc};

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::{
    aggregator::fetchers,
    configuration::{ChainConfig, Config},
    error::Error,
    helpers::{from_wei, parse_hex_u128, parse_hex_u64},
    provider::Upstream,
    types::{
        ExplorerBlock, ExplorerSnapshot, ExplorerStats, ExplorerTransaction,
        PriceData, RpcBlock, RpcReceipt, Scope,
    },
};

/// `SendCrossChainMessage` event topic of the teleporter messenger.
pub const SEND_CROSS_CHAIN_MESSAGE_TOPIC: &str =
    "0x2a211ad4a59ab9d003852404f9c57c690704ee755f3c79d2c2812ad32da99df8";

/// `ReceiveCrossChainMessage` event topic of the teleporter messenger.
pub const RECEIVE_CROSS_CHAIN_MESSAGE_TOPIC: &str =
    "0x292ee90bbaf70b5d4936025e09d56ba08f3e421156b6a568cf3c2840d9343e34";

const ICM_TOPICS: [&str; 2] = [
    SEND_CROSS_CHAIN_MESSAGE_TOPIC,
    RECEIVE_CROSS_CHAIN_MESSAGE_TOPIC,
];

pub async fn build_snapshot(
    upstream: Arc<dyn Upstream>,
    config: &Config,
    chain: &ChainConfig,
) -> Result<ExplorerSnapshot, Error> {
    let rpc_url = chain
        .rpc_url
        .as_deref()
        .ok_or_else(|| Error::RpcNotConfigured(chain.chain_id.to_owned()))?;
    let concurrency = config.rpc_max_concurrency.max(1);
    let node = upstream.as_ref();

    let latest_block = upstream.block_number(rpc_url).await?;
    let oldest = latest_block
        .saturating_sub(config.explorer_block_window.saturating_sub(1) as u64);

    let rpc_blocks: Vec<RpcBlock> = stream::iter((oldest..=latest_block).rev())
        .map(|number| fetchers::fetch_block(node, rpc_url, number))
        .buffered(concurrency)
        .filter_map(|block| async move { block })
        .collect()
        .await;

    let hashes: Vec<String> = rpc_blocks
        .iter()
        .flat_map(|block| block.transactions.iter().map(|tx| tx.hash.to_owned()))
        .collect();

    let receipts: HashMap<String, RpcReceipt> = stream::iter(hashes)
        .map(|hash| async move {
            fetchers::fetch_receipt(node, rpc_url, &hash).await
        })
        .buffer_unordered(concurrency)
        .filter_map(|receipt| async move { receipt })
        .map(|receipt| (receipt.transaction_hash.to_owned(), receipt))
        .collect()
        .await;

    debug!(
        "Chain {}: {} blocks, {} receipts",
        chain.chain_id,
        rpc_blocks.len(),
        receipts.len()
    );

    let mut blocks = Vec::with_capacity(rpc_blocks.len());
    let mut recent = vec![];

    for rpc_block in &rpc_blocks {
        let number = parse_hex_u64(&rpc_block.number)?;
        let timestamp = parse_hex_u64(&rpc_block.timestamp)? as i64;
        let mut block_fee: u128 = 0;

        for tx in &rpc_block.transactions {
            let receipt = receipts.get(&tx.hash);
            let fee = match receipt {
                Some(receipt) => receipt_fee(receipt, tx.gas_price.as_deref())?,
                None => 0,
            };
            block_fee = block_fee.saturating_add(fee);

            if recent.len() < config.explorer_transaction_window {
                recent.push(ExplorerTransaction {
                    hash: tx.hash.to_owned(),
                    block_number: number,
                    timestamp,
                    from: tx.from.to_owned(),
                    to: tx.to.to_owned(),
                    value: from_wei(parse_hex_u128(&tx.value)?),
                    gas_fee: from_wei(fee),
                    success: receipt.map(is_success).unwrap_or(false),
                    cross_chain: receipt.map(is_cross_chain).unwrap_or(false),
                });
            }
        }

        blocks.push(ExplorerBlock {
            number,
            hash: rpc_block.hash.to_owned(),
            timestamp,
            miner: rpc_block.miner.to_owned(),
            transaction_count: rpc_block.transactions.len(),
            gas_used: parse_hex_u64(&rpc_block.gas_used)?,
            gas_limit: parse_hex_u64(&rpc_block.gas_limit)?,
            base_fee_per_gas: rpc_block
                .base_fee_per_gas
                .as_deref()
                .map(parse_hex_u128)
                .transpose()?,
            gas_fee: from_wei(block_fee),
        });
    }

    let (icm_messages, transactions): (Vec<_>, Vec<_>) =
        recent.into_iter().partition(|tx| tx.cross_chain);

    let scope = Scope::Chain(chain.chain_id.to_owned());
    let (total_transactions, price) = tokio::join!(
        fetchers::fetch_total_transactions(node, &scope),
        fetch_price_data(node, chain),
    );

    let stats = block_stats(&blocks, total_transactions);

    Ok(ExplorerSnapshot {
        chain_id: chain.chain_id.to_owned(),
        latest_block,
        blocks,
        transactions,
        icm_messages,
        stats,
        price,
    })
}

/// `gasUsed * effectiveGasPrice` in wei, falling back to the legacy
/// transaction gas price.
fn receipt_fee(
    receipt: &RpcReceipt,
    tx_gas_price: Option<&str>,
) -> Result<u128, Error> {
    let gas_used = parse_hex_u128(&receipt.gas_used)?;
    let gas_price = match receipt.effective_gas_price.as_deref().or(tx_gas_price)
    {
        Some(price) => parse_hex_u128(price)?,
        None => 0,
    };
    Ok(gas_used.saturating_mul(gas_price))
}

/// Receipts without a status field predate status codes and succeeded.
fn is_success(receipt: &RpcReceipt) -> bool {
    match receipt.status.as_deref() {
        Some(status) => status == "0x1",
        None => true,
    }
}

fn is_cross_chain(receipt: &RpcReceipt) -> bool {
    receipt.logs.iter().any(|log| {
        log.topics
            .first()
            .map(|topic| {
                ICM_TOPICS.iter().any(|icm| icm.eq_ignore_ascii_case(topic))
            })
            .unwrap_or(false)
    })
}

/// `blocks` is newest first.
fn block_stats(
    blocks: &[ExplorerBlock],
    total_transactions: Option<f64>,
) -> ExplorerStats {
    let (avg_block_time, tps) = match (blocks.first(), blocks.last()) {
        (Some(newest), Some(oldest)) if blocks.len() > 1 => {
            let span = (newest.timestamp - oldest.timestamp) as f64;
            let tx_count: usize =
                blocks.iter().map(|block| block.transaction_count).sum();
            if span > 0.0 {
                (span / (blocks.len() - 1) as f64, tx_count as f64 / span)
            } else {
                (0.0, 0.0)
            }
        },
        _ => (0.0, 0.0),
    };

    ExplorerStats {
        avg_block_time,
        tps,
        total_transactions,
        gas_price: blocks.first().and_then(|block| block.base_fee_per_gas),
    }
}

async fn fetch_price_data(
    upstream: &dyn Upstream,
    chain: &ChainConfig,
) -> Option<PriceData> {
    let coingecko_id = chain.coingecko_id.as_deref()?;
    let price = fetchers::fetch_price(upstream, coingecko_id).await?;

    Some(PriceData {
        price: price.usd,
        price_change_percentage_24h: price.usd_24h_change,
        market_cap: price.usd_market_cap,
    })
}

#[cfg(test)]
mod tests {
    use std::{str::FromStr, sync::atomic::Ordering};

    use bigdecimal::BigDecimal;

    use super::*;
    use crate::{
        test_support::{
            test_config, tx_hash, FakeUpstream, GAS_PRICE, LATEST_BLOCK,
            SEND_TOPIC,
        },
        types::{CoinGeckoPriceData, MetricName, RpcLog},
    };

    fn chain(config: &Config, id: &str) -> ChainConfig {
        config.hash_map_chains.get(id).cloned().unwrap()
    }

    #[test]
    fn test_send_topic_is_recognised() {
        assert_eq!(SEND_TOPIC, SEND_CROSS_CHAIN_MESSAGE_TOPIC);

        let receipt = RpcReceipt {
            transaction_hash: String::from("0x1"),
            gas_used: String::from("0x1"),
            effective_gas_price: None,
            status: None,
            logs: vec![RpcLog {
                address: String::from("0xteleporter"),
                topics: vec![RECEIVE_CROSS_CHAIN_MESSAGE_TOPIC.to_uppercase()],
            }],
        };
        assert!(is_cross_chain(&receipt));
        assert!(is_success(&receipt));
    }

    #[tokio::test]
    async fn test_block_fee_saturates_on_absurd_receipts() {
        let upstream = FakeUpstream::new();
        upstream.max_gas_used.store(true, Ordering::SeqCst);
        let config = test_config();
        let chain = chain(&config, "43114");

        let snapshot =
            build_snapshot(upstream.clone(), &config, &chain).await.unwrap();

        assert_eq!(snapshot.blocks[0].transaction_count, 2);
        assert_eq!(snapshot.blocks[0].gas_fee, from_wei(u128::MAX));
        assert_eq!(snapshot.transactions[0].gas_fee, from_wei(u128::MAX));
    }

    #[tokio::test]
    async fn test_snapshot_from_fake_node() {
        let upstream = FakeUpstream::new();
        *upstream.price.lock().unwrap() = Some(CoinGeckoPriceData {
            usd: 21.5,
            usd_24h_change: Some(-1.25),
            usd_market_cap: None,
        });
        let config = test_config();
        let chain = chain(&config, "43114");

        let snapshot =
            build_snapshot(upstream.clone(), &config, &chain).await.unwrap();

        assert_eq!(snapshot.latest_block, LATEST_BLOCK);
        assert_eq!(snapshot.blocks.len(), config.explorer_block_window);
        assert_eq!(snapshot.blocks[0].number, LATEST_BLOCK);
        assert_eq!(snapshot.blocks[0].transaction_count, 2);
        assert_eq!(snapshot.blocks[0].base_fee_per_gas, Some(GAS_PRICE));
        assert_eq!(
            snapshot.blocks[0].gas_fee,
            BigDecimal::from_str("0.00105").unwrap()
        );
        assert_eq!(upstream.receipt_calls.load(Ordering::SeqCst), 20);

        assert_eq!(snapshot.transactions.len(), 7);
        assert_eq!(snapshot.icm_messages.len(), 3);
        assert_eq!(snapshot.icm_messages[0].hash, tx_hash(LATEST_BLOCK, 0));
        assert!(snapshot.icm_messages.iter().all(|tx| tx.cross_chain));
        assert_eq!(snapshot.transactions[0].value, BigDecimal::from(1));
        assert!(snapshot.transactions[0].success);

        assert_eq!(snapshot.stats.avg_block_time, 2.0);
        assert_eq!(snapshot.stats.tps, 20.0 / 18.0);
        assert_eq!(snapshot.stats.gas_price, Some(GAS_PRICE));
        let base = MetricName::CumulativeTxCount as usize as f64;
        assert_eq!(snapshot.stats.total_transactions, Some(base + 1.0));

        let price = snapshot.price.unwrap();
        assert_eq!(price.price, 21.5);
        assert_eq!(price.price_change_percentage_24h, Some(-1.25));
    }

    #[tokio::test]
    async fn test_snapshot_requires_rpc_url() {
        let upstream = FakeUpstream::new();
        let config = test_config();
        let chain = chain(&config, "555");

        let result = build_snapshot(upstream.clone(), &config, &chain).await;

        assert!(matches!(result, Err(Error::RpcNotConfigured(id)) if id == "555"));
        assert_eq!(upstream.receipt_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_snapshot_fails_when_node_is_down() {
        let upstream = FakeUpstream::new();
        upstream.fail_rpc.store(true, Ordering::SeqCst);
        let config = test_config();
        let chain = chain(&config, "43114");

        let result = build_snapshot(upstream, &config, &chain).await;

        assert!(matches!(result, Err(Error::RpcError { .. })));
    }

    #[test]
    fn test_block_stats_single_block() {
        let block = ExplorerBlock {
            number: 1,
            hash: String::from("0x1"),
            timestamp: 10,
            miner: String::new(),
            transaction_count: 3,
            gas_used: 0,
            gas_limit: 0,
            base_fee_per_gas: None,
            gas_fee: from_wei(0),
        };

        let stats = block_stats(&[block], None);
        assert_eq!(stats.avg_block_time, 0.0);
        assert_eq!(stats.tps, 0.0);
        assert!(stats.gas_price.is_none());
    }
}
