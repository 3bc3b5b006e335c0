use chrono::{DateTime, Utc};
use lc_types::{Error, Result};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `input`. Used both for the idempotency key and for
/// `ApiKey.key_lookup_hash` (C8), which is why it lives in the shared
/// identity crate rather than duplicated in `lc-ingest`/`lc-keystore`.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Idempotency key: hex SHA-256 of
/// `producer‖job.namespace‖job.name‖run_id‖event_time‖event_type`, joined
/// with a `|` separator so no field can bleed into its neighbor.
pub fn idempotency_key(
    producer: &str,
    job_namespace: &str,
    job_name: &str,
    run_id: &str,
    event_time: DateTime<Utc>,
    event_type: &str,
) -> String {
    let mut hasher = Sha256::new();
    for field in [
        producer,
        job_namespace,
        job_name,
        run_id,
        &event_time.to_rfc3339(),
        event_type,
    ] {
        hasher.update(field.as_bytes());
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}

/// Hash a plaintext API key for storage (`ApiKey.key_hash`, I6). CPU-bound,
/// ~50ms — callers on an async executor should run this via
/// `tokio::task::spawn_blocking` rather than inline on a reactor thread.
pub fn bcrypt_hash(plaintext: &str) -> Result<String> {
    bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)
        .map_err(|e| Error::lineage_store_failed(format!("bcrypt hash failed: {e}")))
}

/// Verify `plaintext` against a stored bcrypt hash. Shared by `lc-keystore`
/// (C8 `FindByKey`) after the O(1) lookup-hash match narrows to one row.
pub fn bcrypt_verify(hash: &str, plaintext: &str) -> Result<bool> {
    bcrypt::verify(plaintext, hash)
        .map_err(|e| Error::lineage_store_failed(format!("bcrypt verify failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sha256_hex_is_stable() {
        assert_eq!(sha256_hex("hello"), sha256_hex("hello"));
        assert_ne!(sha256_hex("hello"), sha256_hex("world"));
    }

    #[test]
    fn idempotency_key_is_deterministic_and_field_sensitive() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = idempotency_key("dbt", "analytics", "customers", "run-1", t, "START");
        let b = idempotency_key("dbt", "analytics", "customers", "run-1", t, "START");
        let c = idempotency_key("dbt", "analytics", "customers", "run-1", t, "COMPLETE");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn bcrypt_round_trips() {
        let hash = bcrypt_hash("s3cr3t-key").unwrap();
        assert!(bcrypt_verify(&hash, "s3cr3t-key").unwrap());
        assert!(!bcrypt_verify(&hash, "wrong-key").unwrap());
    }
}
