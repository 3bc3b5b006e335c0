use thiserror::Error;

/// Canonical error type for the lineage correlation core.
///
/// Every fallible operation across `lc-*` returns `Result<T>` with this
/// error type so callers can match on a sentinel variant (`Error::KeyNotFound`,
/// `Error::TestResultFkViolation`, …) instead of parsing a message string.
/// Variants that wrap a driver error keep it via `#[source]` so `anyhow`-style
/// diagnostics (operation, duration, cause) are never lost.
#[derive(Debug, Error)]
pub enum Error {
    /// Construction with no usable connection, or a failed health check.
    #[error("no database connection: {0}")]
    NoDatabaseConnection(String),

    /// `DATABASE_URL` is empty or whitespace-only.
    #[error("DATABASE_URL is empty")]
    DatabaseUrlEmpty,

    /// GC worker constructed with a non-positive cleanup interval.
    #[error("cleanup_interval must be > 0")]
    InvalidCleanupInterval,

    /// Input-shape violation, transaction failure, or other unexpected
    /// failure while storing a lineage event.
    #[error("lineage store failed: {0}")]
    LineageStoreFailed(String),

    /// The idempotency-key lookup itself failed (distinct from "duplicate found").
    #[error("idempotency check failed")]
    IdempotencyCheckFailed {
        #[source]
        source: sqlx::Error,
    },

    /// Programmer error: an edge type outside {input, output}.
    #[error("invalid edge type: {0}")]
    InvalidEdgeType(String),

    /// A test-result write failed for a reason other than an FK violation.
    #[error("test result store failed")]
    TestResultStoreFailed {
        #[source]
        source: sqlx::Error,
    },

    /// A test-result write violated a foreign key (dataset/job run does not
    /// exist). Distinct and not retryable against the current dataset set.
    #[error("test result violates a foreign key constraint")]
    TestResultFkViolation,

    /// `refresh_correlation_views` failed.
    #[error("materialized view refresh failed")]
    ViewRefreshFailed {
        #[source]
        source: sqlx::Error,
    },

    /// A read-side correlation query failed.
    #[error("correlation query failed")]
    CorrelationQueryFailed {
        #[source]
        source: sqlx::Error,
    },

    /// A nil/empty key was passed where a real `ApiKey` was required.
    #[error("key must not be nil")]
    KeyNil,

    /// `Add` called with a key that already exists (by lookup hash).
    #[error("api key already exists")]
    KeyAlreadyExists,

    /// `Update`/`Delete` called against an id that does not exist.
    #[error("api key not found")]
    KeyNotFound,

    /// `ListByPlugin`/`Add` called with an empty plugin id.
    #[error("plugin id must not be empty")]
    PluginIdEmpty,

    /// The caller's context was cancelled or its deadline elapsed.
    #[error("operation cancelled or deadline exceeded")]
    Cancelled,

    /// A connection-class driver error (SQLSTATE `08*`, or a closed/bad
    /// connection sentinel). Catastrophic in a `StoreEvents` batch — stops
    /// the batch rather than being attributed to one event.
    #[error("connection error")]
    Connection {
        #[source]
        source: sqlx::Error,
    },

    /// Any other, unclassified driver error.
    #[error("database error")]
    Db(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn lineage_store_failed(msg: impl Into<String>) -> Self {
        Error::LineageStoreFailed(msg.into())
    }

    pub fn no_database_connection(msg: impl Into<String>) -> Self {
        Error::NoDatabaseConnection(msg.into())
    }

    /// `true` for a Postgres SQLSTATE class `08*` ("connection exception"),
    /// or for a driver's own closed/bad-pool sentinel. Used by `StoreEvents`
    /// to decide whether a per-event failure should stop the whole batch.
    pub fn is_connection_class(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => true,
            sqlx::Error::Database(db_err) => db_err
                .code()
                .map(|code| code.starts_with("08"))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Wrap a driver error from a test-result write, distinguishing an FK
    /// violation (SQLSTATE `23503`) from any other failure.
    pub fn from_test_result_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23503") {
                return Error::TestResultFkViolation;
            }
        }
        Error::TestResultStoreFailed { source: err }
    }

    /// Classify a raw driver error from any `store_event` write site:
    /// connection-class errors become [`Error::Connection`] so
    /// `StoreEvents`'s catastrophic-stop check (spec §4.3/§7) can see them
    /// regardless of which statement produced them; everything else is
    /// wrapped as [`Error::LineageStoreFailed`] with `context` prefixed for
    /// diagnostics.
    pub fn from_store_event(context: impl Into<String>, err: sqlx::Error) -> Self {
        if Self::is_connection_class(&err) {
            Error::Connection { source: err }
        } else {
            Error::LineageStoreFailed(format!("{}: {err}", context.into()))
        }
    }
}
