//! App state: configuration, rule store, delivery service, counters.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use reach_cache::{CacheConfig, ResponseCache};
use reach_core::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_STORE_TIMEOUT, DEFAULT_SWEEP_INTERVAL, DELIVERY_CACHE_TTL,
};
use reach_core::error::{ReachError, Result};
use reach_core::traits::RuleStore;
use reach_delivery::{DeliveryService, DeliveryStats};
use reach_engine::{EngineConfig, TargetingEngine};
use reach_store::MemoryRuleStore;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Server configuration, normally read from the environment.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// `APP_PORT`
    pub port: u16,
    /// `BIND_ADDR`
    pub bind_addr: String,
    /// `CACHE_SIZE`: maximum cached payloads
    pub cache_size: usize,
    /// `CACHE_TTL_SECONDS`
    pub cache_ttl: Duration,
    /// `CACHE_SWEEP_SECONDS`
    pub sweep_interval: Duration,
    /// `STORE_TIMEOUT_MS`
    pub store_timeout: Duration,
    /// `RULES_FILE`: JSON fixture loaded into the memory store
    pub rules_file: Option<PathBuf>,
    /// `TURSO_URL`
    pub turso_url: Option<String>,
    /// `TURSO_AUTH_TOKEN`
    pub turso_auth_token: Option<String>,
    /// `LOG_LEVEL`
    pub log_level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_addr: DEFAULT_BIND_ADDR.into(),
            cache_size: DEFAULT_CACHE_CAPACITY,
            cache_ttl: DELIVERY_CACHE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            rules_file: None,
            turso_url: None,
            turso_auth_token: None,
            log_level: DEFAULT_LOG_LEVEL.into(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ReachError::Config(format!("{} has invalid value '{}'", name, value))),
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ApiConfig {
    /// Reads the configuration from the process environment, after loading
    /// a `.env` file if one exists.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through a variable lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            port: parse_var("APP_PORT", lookup("APP_PORT"), defaults.port)?,
            bind_addr: non_blank(lookup("BIND_ADDR")).unwrap_or(defaults.bind_addr),
            cache_size: parse_var("CACHE_SIZE", lookup("CACHE_SIZE"), defaults.cache_size)?,
            cache_ttl: Duration::from_secs(parse_var(
                "CACHE_TTL_SECONDS",
                lookup("CACHE_TTL_SECONDS"),
                defaults.cache_ttl.as_secs(),
            )?),
            sweep_interval: Duration::from_secs(parse_var(
                "CACHE_SWEEP_SECONDS",
                lookup("CACHE_SWEEP_SECONDS"),
                defaults.sweep_interval.as_secs(),
            )?),
            store_timeout: Duration::from_millis(parse_var(
                "STORE_TIMEOUT_MS",
                lookup("STORE_TIMEOUT_MS"),
                defaults.store_timeout.as_millis() as u64,
            )?),
            rules_file: non_blank(lookup("RULES_FILE")).map(PathBuf::from),
            turso_url: non_blank(lookup("TURSO_URL")),
            turso_auth_token: non_blank(lookup("TURSO_AUTH_TOKEN")),
            log_level: non_blank(lookup("LOG_LEVEL"))
                .map(|level| level.to_ascii_lowercase())
                .unwrap_or(defaults.log_level),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.cache_size == 0 {
            return Err(ReachError::Config("CACHE_SIZE must be positive".into()));
        }
        if self.cache_ttl.is_zero() {
            return Err(ReachError::Config("CACHE_TTL_SECONDS must be positive".into()));
        }
        if self.sweep_interval.is_zero() {
            return Err(ReachError::Config("CACHE_SWEEP_SECONDS must be positive".into()));
        }
        if self.store_timeout.is_zero() {
            return Err(ReachError::Config("STORE_TIMEOUT_MS must be positive".into()));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ReachError::Config(format!(
                "LOG_LEVEL must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log_level
            )));
        }
        self.socket_addr()?;
        Ok(())
    }

    /// Tracing filter directive for this configuration: REACH crates at
    /// `log_level`, everything else at warn. `verbose` forces debug.
    pub fn log_directive(&self, verbose: bool) -> String {
        if verbose {
            "reach=debug,info".to_string()
        } else {
            format!("reach={},warn", self.log_level)
        }
    }

    /// Address the server binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_addr
            .parse()
            .map_err(|_| ReachError::Config(format!("BIND_ADDR '{}' is not an IP address", self.bind_addr)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Shared state behind every handler.
pub struct AppState {
    /// Server configuration
    pub config: ApiConfig,
    /// Rule store backing the engine and the discovery endpoints
    pub store: Arc<dyn RuleStore>,
    /// Delivery orchestrator
    pub service: DeliveryService,
    /// Delivery and eviction counters
    pub stats: Arc<DeliveryStats>,
    /// Process start, for uptime
    pub started_at: Instant,
}

impl AppState {
    /// Wires the cache, engine, and service around a rule store.
    pub fn new(config: ApiConfig, store: Arc<dyn RuleStore>) -> Self {
        let stats = Arc::new(DeliveryStats::new());

        let cache = ResponseCache::with_config(
            CacheConfig::default().max_entries(config.cache_size),
        )
        .with_observer(stats.clone());

        let engine = TargetingEngine::with_config(
            store.clone(),
            EngineConfig::new().store_timeout(config.store_timeout),
        );

        let service = DeliveryService::new(engine, Arc::new(cache))
            .with_ttl(config.cache_ttl)
            .with_observer(stats.clone());

        Self {
            config,
            store,
            service,
            stats,
            started_at: Instant::now(),
        }
    }

    /// Opens the rule store the configuration names, then wires the state.
    ///
    /// Preference: Turso (when built with the `turso` feature), then
    /// `RULES_FILE`, then an empty in-memory store.
    pub async fn from_config(config: ApiConfig) -> Result<Self> {
        let store = open_store(&config).await?;
        Ok(Self::new(config, store))
    }
}

async fn open_store(config: &ApiConfig) -> Result<Arc<dyn RuleStore>> {
    #[cfg(feature = "turso")]
    if let Some(url) = &config.turso_url {
        let token = config.turso_auth_token.as_deref().unwrap_or_default();
        let store = reach_store::SqlRuleStore::connect_remote(url, token).await?;
        return Ok(Arc::new(store));
    }
    #[cfg(not(feature = "turso"))]
    if config.turso_url.is_some() {
        warn!("TURSO_URL is set but this build has no Turso support; ignoring it");
    }

    match &config.rules_file {
        Some(path) => {
            let store = MemoryRuleStore::from_file(path).await?;
            info!(
                path = %path.display(),
                campaigns = store.campaign_count(),
                rules = store.rule_count(),
                "Loaded rule store from file"
            );
            Ok(Arc::new(store))
        }
        None => {
            warn!("No RULES_FILE or TURSO_URL configured; serving from an empty rule store");
            Ok(Arc::new(MemoryRuleStore::new()))
        }
    }
}
