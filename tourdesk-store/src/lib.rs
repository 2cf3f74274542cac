pub mod app_config;
#[cfg(feature = "kafka")]
pub mod events;
pub mod redis_repo;

pub use app_config::{Config, LedgerBackend};
#[cfg(feature = "kafka")]
pub use events::{EventProducer, KafkaNotifier};
pub use redis_repo::RedisSeatLedger;
