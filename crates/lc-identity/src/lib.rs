//! Identity & hashing: producer-URL parsing, canonical job-run id
//! construction, idempotency-key hashing, and the bcrypt helpers shared
//! with `lc-keystore`.

mod hashing;
mod producer;

pub use hashing::{bcrypt_hash, bcrypt_verify, idempotency_key, sha256_hex};
pub use producer::{canonical_job_run_id, parse_producer_url, ProducerInfo};
