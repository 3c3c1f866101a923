use bigdecimal::BigDecimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerBlock {
    pub number: u64,
    pub hash: String,
    pub timestamp: i64,
    pub miner: String,
    pub transaction_count: usize,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub base_fee_per_gas: Option<u128>,
    /// Sum of `gasUsed * effectiveGasPrice` over the block's receipts, in
    /// native token units.
    pub gas_fee: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTransaction {
    pub hash: String,
    pub block_number: u64,
    pub timestamp: i64,
    pub from: String,
    pub to: Option<String>,
    pub value: BigDecimal,
    pub gas_fee: BigDecimal,
    pub success: bool,
    pub cross_chain: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerStats {
    pub avg_block_time: f64,
    pub tps: f64,
    pub total_transactions: Option<f64>,
    pub gas_price: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceData {
    pub price: f64,
    pub price_change_percentage_24h: Option<f64>,
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerSnapshot {
    pub chain_id: String,
    pub latest_block: u64,
    pub blocks: Vec<ExplorerBlock>,
    pub transactions: Vec<ExplorerTransaction>,
    pub icm_messages: Vec<ExplorerTransaction>,
    pub stats: ExplorerStats,
    pub price: Option<PriceData>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerResponse {
    #[serde(flatten)]
    pub snapshot: ExplorerSnapshot,
    pub glacier_supported: bool,
}
