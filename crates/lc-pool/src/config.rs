use std::time::Duration;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_MAX_OPEN: &str = "DATABASE_MAX_OPEN_CONNS";
pub const ENV_MAX_IDLE: &str = "DATABASE_MAX_IDLE_CONNS";
pub const ENV_MAX_LIFETIME: &str = "DATABASE_CONN_MAX_LIFETIME";
pub const ENV_MAX_IDLE_TIME: &str = "DATABASE_CONN_MAX_IDLE_TIME";

const DEFAULT_MAX_OPEN: u32 = 10;
const DEFAULT_MAX_IDLE: u32 = 5;
const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);
const DEFAULT_MAX_IDLE_TIME: Duration = Duration::from_secs(10 * 60);

/// Connection pool configuration (spec §4.1).
///
/// `from_env` never hard-fails on a malformed numeric/duration value — it
/// falls back to the default and logs a warning, the way the workspace
/// teacher's config loaders treat malformed layered config. The one value
/// that *does* hard-fail is `url` itself: empty or whitespace-only is
/// `Error::DatabaseUrlEmpty`.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub url: String,
    pub max_open: u32,
    pub max_idle: u32,
    pub max_lifetime: Duration,
    pub max_idle_time: Duration,
}

impl PoolConfig {
    pub fn from_env() -> lc_types::Result<Self> {
        let url = std::env::var(ENV_DATABASE_URL).unwrap_or_default();
        if url.trim().is_empty() {
            return Err(lc_types::Error::DatabaseUrlEmpty);
        }

        Ok(Self {
            url,
            max_open: env_u32_or_default(ENV_MAX_OPEN, DEFAULT_MAX_OPEN),
            max_idle: env_u32_or_default(ENV_MAX_IDLE, DEFAULT_MAX_IDLE),
            max_lifetime: env_duration_or_default(ENV_MAX_LIFETIME, DEFAULT_MAX_LIFETIME),
            max_idle_time: env_duration_or_default(ENV_MAX_IDLE_TIME, DEFAULT_MAX_IDLE_TIME),
        })
    }

    /// Build directly from a connection string, using defaults for every
    /// other option. Useful for tests and for callers that already resolved
    /// `DATABASE_URL` themselves.
    pub fn from_url(url: impl Into<String>) -> lc_types::Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(lc_types::Error::DatabaseUrlEmpty);
        }
        Ok(Self {
            url,
            max_open: DEFAULT_MAX_OPEN,
            max_idle: DEFAULT_MAX_IDLE,
            max_lifetime: DEFAULT_MAX_LIFETIME,
            max_idle_time: DEFAULT_MAX_IDLE_TIME,
        })
    }
}

fn env_u32_or_default(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Err(_) => default,
        Ok(raw) => match raw.trim().parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, raw, default, "invalid numeric env var, using default");
                default
            }
        },
    }
}

fn env_duration_or_default(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Err(_) => default,
        Ok(raw) => match parse_duration(raw.trim()) {
            Some(d) => d,
            None => {
                tracing::warn!(key, raw, ?default, "invalid duration env var, using default");
                default
            }
        },
    }
}

/// Parse a duration written as a bare integer (seconds) or with a unit
/// suffix: `s` (seconds), `m` (minutes), `h` (hours).
fn parse_duration(raw: &str) -> Option<Duration> {
    if raw.is_empty() {
        return None;
    }
    let (num, unit) = match raw.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&raw[..raw.len() - 1], c),
        _ => (raw, 's'),
    };
    let n: u64 = num.parse().ok()?;
    let secs = match unit {
        's' => n,
        'm' => n.checked_mul(60)?,
        'h' => n.checked_mul(3600)?,
        'd' => n.checked_mul(86_400)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_seconds() {
        assert_eq!(parse_duration("45"), Some(Duration::from_secs(45)));
    }

    #[test]
    fn parses_unit_suffixes() {
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("1d"), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_duration("not-a-duration"), None);
        assert_eq!(parse_duration(""), None);
    }
}
