//! Error types for the calendar store, seeder and service.

use chrono::NaiveDateTime;

/// Main calendar error type
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    /// Underlying SQLite failure
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An event or query range whose start is not before its end
    #[error("invalid time range: {start} is not before {end}")]
    InvalidTimeRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    /// A stored or supplied timestamp that does not parse
    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Slot length that is not positive or does not fit the calendar
    #[error("invalid duration: {0} minutes")]
    InvalidDuration(i64),

    #[error("event {0} not found")]
    EventNotFound(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    /// Seed data violates a data-model invariant
    #[error("invalid seed data: {0}")]
    Seed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A `.env` file that exists but cannot be loaded
    #[error("environment file error: {0}")]
    Env(#[from] dotenvy::Error),

    /// The service was used before `start` or after `stop`
    #[error("calendar service is not started")]
    NotStarted,
}

pub type Result<T> = std::result::Result<T, CalendarError>;
