use serde::Deserialize;
use std::env;
use tourdesk_catalog::PriceBasis;
use tourdesk_shared::Currency;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub vouchers: VoucherConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: LedgerBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String {
    "tour.bookings".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}

/// Reference data. An empty vehicle list means "use the built-in table".
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub vehicles: Vec<VehicleEntry>,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VehicleEntry {
    pub id: String,
    pub name: String,
    pub capacity: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouteEntry {
    pub id: String,
    pub name: String,
    pub duration_minutes: u32,
    /// Minor units.
    pub base_price: i64,
    pub currency: Currency,
    #[serde(default)]
    pub price_basis: PriceBasis,
    #[serde(default)]
    pub capacity_override: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VoucherConfig {
    #[serde(default = "default_voucher_prefix")]
    pub prefix: String,
}

impl Default for VoucherConfig {
    fn default() -> Self {
        Self {
            prefix: default_voucher_prefix(),
        }
    }
}

fn default_voucher_prefix() -> String {
    "TD".to_string()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `TOURDESK__SERVER__PORT=8081`
            .add_source(config::Environment::with_prefix("TOURDESK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
