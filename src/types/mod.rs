pub use self::{
    explorer::{
        ExplorerBlock, ExplorerResponse, ExplorerSnapshot, ExplorerStats,
        ExplorerTransaction, PriceData,
    },
    metric_request::{
        MetricName, MetricRequest, Scope, TimeInterval, TimeRange, Window,
        AGGREGATE_SCOPE_TOKEN, ALL_CHAINS, MAX_ICM_DAYS,
    },
    rpc::{
        JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcBlock, RpcLog,
        RpcReceipt, RpcTransaction,
    },
    series::{
        format_date, ActiveAddressesSeries, ChainStatsPayload, IcmDataPoint,
        IcmSeries, MetricSeries, MetricValue, SeriesSummary,
        TimeSeriesDataPoint, Trend,
    },
    upstream::{
        CoinGeckoPriceData, CoinGeckoSimplePrice, MetricPage, MetricPoint,
    },
};

mod explorer;
mod metric_request;
mod rpc;
mod series;
mod upstream;
