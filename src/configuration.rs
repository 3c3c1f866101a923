use std::{
    collections::HashMap, env, fmt::Display, fs, ops::Deref, path::Path,
    str::FromStr, sync::Arc, time::Duration,
};

use crate::{
    cache::TimedStore,
    error::Error,
    helpers::parse_tuple_string,
    provider::Upstream,
    types::{ChainStatsPayload, ExplorerSnapshot},
};

#[derive(Debug)]
pub struct AppState<T>(Arc<T>);

impl<T> AppState<T> {
    pub fn new(state: T) -> AppState<T> {
        AppState(Arc::new(state))
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> AppState<T> {
        AppState(Arc::clone(&self.0))
    }
}

impl<T> Deref for AppState<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Arc<T> {
        &self.0
    }
}

/// Caches owned by the running process. Built once in `main` and handed
/// to every route through `AppState`.
#[derive(Debug)]
pub struct ApiCache {
    pub chain_stats: TimedStore<ChainStatsPayload>,
    pub explorer: TimedStore<ExplorerSnapshot>,
    pub glacier_support: TimedStore<bool>,
}

impl ApiCache {
    pub fn new(config: &Config) -> ApiCache {
        ApiCache {
            chain_stats: TimedStore::new(Duration::from_secs(
                config.chain_stats_cache_ttl_secs,
            )),
            explorer: TimedStore::new(Duration::from_secs(
                config.explorer_cache_ttl_secs,
            )),
            glacier_support: TimedStore::new(Duration::from_secs(
                config.glacier_support_ttl_secs,
            )),
        }
    }
}

pub struct State {
    pub config: Config,
    pub upstream: Arc<dyn Upstream>,
    pub api_cache: ApiCache,
}

impl State {
    pub fn new(config: Config, upstream: Arc<dyn Upstream>) -> State {
        let api_cache = ApiCache::new(&config);
        State {
            config,
            upstream,
            api_cache,
        }
    }

    pub fn get_chain(&self, chain_id: &str) -> Result<&ChainConfig, Error> {
        self.config
            .hash_map_chains
            .get(chain_id)
            .ok_or_else(|| Error::ChainNotFound(chain_id.to_owned()))
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("config", &self.config)
            .field("api_cache", &self.api_cache)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub chain_id: String,
    pub name: String,
    pub rpc_url: Option<String>,
    pub coingecko_id: Option<String>,
    pub symbol: String,
}

impl FromStr for ChainConfig {
    type Err = Error;

    /// `id,name,rpc_url,coingecko_id,symbol`; empty fields are unset.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let items: Vec<&str> = value.split(',').map(str::trim).collect();
        if items.len() != 5 {
            return Err(Error::ConfigurationError(format!(
                "chain entry '{}' must have 5 fields",
                value
            )));
        }

        let optional = |item: &str| {
            if item.is_empty() {
                None
            } else {
                Some(item.to_owned())
            }
        };

        Ok(ChainConfig {
            chain_id: items[0].to_owned(),
            name: items[1].to_owned(),
            rpc_url: optional(items[2]),
            coingecko_id: optional(items[3]),
            symbol: items[4].to_owned(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub timeout: u64,
    pub metrics_api_url: String,
    pub metrics_bypass_token: Option<String>,
    pub icm_indexer_url: String,
    pub glacier_api_url: String,
    pub glacier_api_key: Option<String>,
    pub coingecko_api_url: String,
    pub chain_stats_cache_ttl_secs: u64,
    pub explorer_cache_ttl_secs: u64,
    pub glacier_support_ttl_secs: u64,
    pub rolling_window_days: i64,
    pub metric_page_size: u32,
    pub metric_fetch_all_pages: bool,
    pub explorer_block_window: usize,
    pub explorer_transaction_window: usize,
    pub rpc_max_concurrency: usize,
    pub cache_warmup_interval_secs: u64,
    pub cache_warmup_scopes: Vec<String>,
    pub chains: Vec<ChainConfig>,
    pub hash_map_chains: HashMap<String, ChainConfig>,
}

impl Config {
    pub fn with_chains(mut self, chains: Vec<ChainConfig>) -> Config {
        self.hash_map_chains = chains
            .iter()
            .map(|chain| (chain.chain_id.to_owned(), chain.clone()))
            .collect();
        self.chains = chains;
        self
    }
}

impl Default for Config {
    fn default() -> Config {
        let c_chain = ChainConfig {
            chain_id: String::from("43114"),
            name: String::from("Avalanche C-Chain"),
            rpc_url: Some(String::from(
                "https://api.avax.network/ext/bc/C/rpc",
            )),
            coingecko_id: Some(String::from("avalanche-2")),
            symbol: String::from("AVAX"),
        };

        Config {
            server_host: String::from("0.0.0.0"),
            port: 8080,
            allowed_origins: vec![String::from("*")],
            timeout: 30,
            metrics_api_url: String::from("https://metrics.avax.network"),
            metrics_bypass_token: None,
            icm_indexer_url: String::from("https://idx6.solokhin.com"),
            glacier_api_url: String::from("https://glacier-api.avax.network"),
            glacier_api_key: None,
            coingecko_api_url: String::from("https://api.coingecko.com"),
            chain_stats_cache_ttl_secs: 3600,
            explorer_cache_ttl_secs: 30,
            glacier_support_ttl_secs: 3600,
            rolling_window_days: 365,
            metric_page_size: 365,
            metric_fetch_all_pages: true,
            explorer_block_window: 10,
            explorer_transaction_window: 10,
            rpc_max_concurrency: 8,
            cache_warmup_interval_secs: 0,
            cache_warmup_scopes: vec![String::from("all")],
            chains: vec![],
            hash_map_chains: HashMap::new(),
        }
        .with_chains(vec![c_chain])
    }
}

pub fn get_configuration() -> Result<Config, Error> {
    let defaults = Config::default();

    let server_host = env_or("SERVER_HOST", defaults.server_host)?;
    let port = env_or("PORT", defaults.port)?;
    let allowed_origins =
        env_list("ALLOWED_ORIGINS").unwrap_or(defaults.allowed_origins);
    let timeout = env_or("TIMEOUT", defaults.timeout)?;
    let metrics_api_url = env_or("METRICS_API_URL", defaults.metrics_api_url)?;
    let metrics_bypass_token = env_optional("METRICS_BYPASS_TOKEN");
    let icm_indexer_url = env_or("ICM_INDEXER_URL", defaults.icm_indexer_url)?;
    let glacier_api_url = env_or("GLACIER_API_URL", defaults.glacier_api_url)?;
    let glacier_api_key = env_optional("GLACIER_API_KEY");
    let coingecko_api_url =
        env_or("COINGECKO_API_URL", defaults.coingecko_api_url)?;
    let chain_stats_cache_ttl_secs = env_or(
        "CHAIN_STATS_CACHE_TTL_SECS",
        defaults.chain_stats_cache_ttl_secs,
    )?;
    let explorer_cache_ttl_secs =
        env_or("EXPLORER_CACHE_TTL_SECS", defaults.explorer_cache_ttl_secs)?;
    let glacier_support_ttl_secs =
        env_or("GLACIER_SUPPORT_TTL_SECS", defaults.glacier_support_ttl_secs)?;
    let rolling_window_days =
        env_or("ROLLING_WINDOW_DAYS", defaults.rolling_window_days)?;
    let metric_page_size =
        env_or("METRIC_PAGE_SIZE", defaults.metric_page_size)?;
    let metric_fetch_all_pages =
        env_or("METRIC_FETCH_ALL_PAGES", defaults.metric_fetch_all_pages)?;
    let explorer_block_window =
        env_or("EXPLORER_BLOCK_WINDOW", defaults.explorer_block_window)?;
    let explorer_transaction_window = env_or(
        "EXPLORER_TRANSACTION_WINDOW",
        defaults.explorer_transaction_window,
    )?;
    let rpc_max_concurrency =
        env_or("RPC_MAX_CONCURRENCY", defaults.rpc_max_concurrency)?;
    let cache_warmup_interval_secs = env_or(
        "CACHE_WARMUP_INTERVAL_SECS",
        defaults.cache_warmup_interval_secs,
    )?;
    let cache_warmup_scopes =
        env_list("CACHE_WARMUP_SCOPES").unwrap_or(defaults.cache_warmup_scopes);

    let chains = match env_optional("CHAINS") {
        Some(value) => parse_chains(value)?,
        None => defaults.chains,
    };

    if rpc_max_concurrency == 0 {
        return Err(Error::ConfigurationError(String::from(
            "RPC_MAX_CONCURRENCY must be greater than zero",
        )));
    }

    let config = Config {
        server_host,
        port,
        allowed_origins,
        timeout,
        metrics_api_url,
        metrics_bypass_token,
        icm_indexer_url,
        glacier_api_url,
        glacier_api_key,
        coingecko_api_url,
        chain_stats_cache_ttl_secs,
        explorer_cache_ttl_secs,
        glacier_support_ttl_secs,
        rolling_window_days,
        metric_page_size,
        metric_fetch_all_pages,
        explorer_block_window,
        explorer_transaction_window,
        rpc_max_concurrency,
        cache_warmup_interval_secs,
        cache_warmup_scopes,
        chains: vec![],
        hash_map_chains: HashMap::new(),
    }
    .with_chains(chains);

    Ok(config)
}

/// Loads `.env` and `stats.conf` from the manifest directory into the
/// process environment. Missing files are skipped.
pub fn set_configuration() -> Result<(), Error> {
    load_config_files(Path::new(env!("CARGO_MANIFEST_DIR")))
}

/// Variables already in the environment win over `.env`, which wins over
/// `stats.conf`.
fn load_config_files(directory: &Path) -> Result<(), Error> {
    let config_file: &str = ".env";
    let stats_config_file: &str = "stats.conf";

    for file in [config_file, stats_config_file] {
        let path = directory.join(file);
        if !path.exists() {
            continue;
        }
        let config_string = fs::read_to_string(path)?;
        parse_config_string(config_string);
    }

    Ok(())
}

fn parse_config_string(config: String) {
    let params = config
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='));

    for (key, value) in params {
        let key = key.trim();
        if env::var_os(key).is_some() {
            continue;
        }
        env::set_var(key, value.trim());
    }
}

fn parse_chains(value: String) -> Result<Vec<ChainConfig>, Error> {
    parse_tuple_string(value)
        .iter()
        .map(|item| ChainConfig::from_str(item))
        .collect()
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env_optional(key).map(|value| {
        value
            .split(',')
            .map(|item| item.trim().to_owned())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

fn env_or<T>(key: &str, default: T) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
{
    match env_optional(key) {
        Some(value) => value.trim().parse::<T>().map_err(|e| {
            Error::ConfigurationError(format!("{}: {}", key, e))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain_entry() {
        let chain = ChainConfig::from_str(
            "779672,Dispatch,https://subnets.avax.network/dispatch/testnet/rpc,,DIS",
        )
        .unwrap();

        assert_eq!(chain.chain_id, "779672");
        assert_eq!(chain.name, "Dispatch");
        assert!(chain.rpc_url.is_some());
        assert!(chain.coingecko_id.is_none());
        assert_eq!(chain.symbol, "DIS");
    }

    #[test]
    fn test_parse_chain_entry_wrong_arity() {
        assert!(matches!(
            ChainConfig::from_str("43114,C-Chain"),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_parse_chains_tuple_list() {
        let chains = parse_chains(String::from(
            "(43114,C-Chain,https://rpc,avalanche-2,AVAX),(1,Empty,,,TKN)",
        ))
        .unwrap();

        assert_eq!(chains.len(), 2);
        assert_eq!(chains[1].chain_id, "1");
        assert!(chains[1].rpc_url.is_none());
    }

    #[test]
    fn test_default_config_registers_c_chain() {
        let config = Config::default();
        assert_eq!(config.chains.len(), 1);
        assert!(config.hash_map_chains.contains_key("43114"));
        assert_eq!(config.chain_stats_cache_ttl_secs, 3600);
    }

    #[test]
    fn test_process_env_wins_over_config_files() {
        let directory = env::temp_dir()
            .join(format!("chain-stats-config-{}", std::process::id()));
        fs::create_dir_all(&directory).unwrap();
        fs::write(
            directory.join("stats.conf"),
            "CHAIN_STATS_TEST_TTL=3600\nCHAIN_STATS_TEST_WINDOW=365\n\
             CHAIN_STATS_TEST_PAGE=100\n",
        )
        .unwrap();
        fs::write(
            directory.join(".env"),
            "# local overrides\nCHAIN_STATS_TEST_TTL=120\nCHAIN_STATS_TEST_WINDOW=30\n",
        )
        .unwrap();
        env::set_var("CHAIN_STATS_TEST_TTL", "60");

        let result = load_config_files(&directory);
        let ttl = env::var("CHAIN_STATS_TEST_TTL");
        let window = env::var("CHAIN_STATS_TEST_WINDOW");
        let page = env::var("CHAIN_STATS_TEST_PAGE");
        for key in [
            "CHAIN_STATS_TEST_TTL",
            "CHAIN_STATS_TEST_WINDOW",
            "CHAIN_STATS_TEST_PAGE",
        ] {
            env::remove_var(key);
        }
        fs::remove_dir_all(&directory).unwrap();

        result.unwrap();
        assert_eq!(ttl.unwrap(), "60");
        assert_eq!(window.unwrap(), "30");
        assert_eq!(page.unwrap(), "100");
    }

    #[test]
    fn test_env_or_reports_key_on_parse_failure() {
        env::set_var("CHAIN_STATS_TEST_PORT", "not-a-port");
        let result: Result<u16, Error> = env_or("CHAIN_STATS_TEST_PORT", 1);
        env::remove_var("CHAIN_STATS_TEST_PORT");

        match result {
            Err(Error::ConfigurationError(message)) => {
                assert!(message.starts_with("CHAIN_STATS_TEST_PORT"))
            },
            other => panic!("unexpected result {:?}", other),
        }
    }
}
