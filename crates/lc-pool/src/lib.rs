//! Connection pool (spec §4.1, component C1): a typed handle over Postgres,
//! bounded and configured from environment, with a cheap health check and a
//! `mask_url` helper so connection strings never hit a log line in the clear.

mod config;
mod pool;

pub use config::{PoolConfig, ENV_DATABASE_URL, ENV_MAX_IDLE, ENV_MAX_IDLE_TIME, ENV_MAX_LIFETIME, ENV_MAX_OPEN};
pub use pool::{mask_url, Pool, PoolStats};
