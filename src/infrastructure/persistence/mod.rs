use crate::domain::errors::{SlaError, SlaResult};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use log::LevelFilter;
use sqlx::{
    any::{AnyConnectOptions, AnyPoolOptions, AnyRow},
    AnyPool, ConnectOptions, Row,
};
use std::str::FromStr;

mod agents;
mod business_hours;
mod settings;
mod sla;
mod teams;

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: AnyPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        // Ensure drivers are installed for AnyPool
        sqlx::any::install_default_drivers();

        let connect_options = AnyConnectOptions::from_str(database_url)?
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, std::time::Duration::from_secs(1));

        let pool = AnyPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    // Per-connection pragmas; foreign keys are off by default in SQLite.
                    sqlx::query("PRAGMA busy_timeout = 5000")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA foreign_keys = ON")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(connect_options)
            .await?;

        if database_url.starts_with("sqlite") {
            sqlx::query("PRAGMA journal_mode = WAL")
                .execute(&pool)
                .await?;
        }

        tracing::info!("Database pool ready");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("migrations/sqlite").run(&self.pool).await
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

/// Nullable text column. `AnyRow` refuses to decode SQL NULL into
/// `Option<String>`, so a failed decode reads as absent.
pub(crate) fn opt_text(row: &AnyRow, column: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(column).ok().flatten()
}

/// Timestamps are stored as fixed-width RFC3339 UTC text so that string
/// comparison in SQL matches chronological order.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Reads RFC3339, or SQLite's `CURRENT_TIMESTAMP` form taken as UTC.
pub(crate) fn parse_ts(value: &str) -> SlaResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .map_err(|e| SlaError::Internal(format!("invalid stored timestamp '{}': {}", value, e)))
}

pub(crate) fn parse_opt_ts(value: Option<String>) -> SlaResult<Option<DateTime<Utc>>> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| parse_ts(&v))
        .transpose()
}

pub(crate) fn format_opt_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.as_ref().map(format_ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format_is_sortable() {
        let a = parse_ts("2026-03-02T09:59:59.999Z").unwrap();
        let b = parse_ts("2026-03-02T10:00:00Z").unwrap();
        assert!(format_ts(&a) < format_ts(&b));
        assert_eq!(format_ts(&b), "2026-03-02T10:00:00.000Z");
    }

    #[test]
    fn test_parse_ts_accepts_sqlite_format() {
        assert_eq!(
            parse_ts("2026-03-02 10:15:00").unwrap(),
            parse_ts("2026-03-02T10:15:00Z").unwrap()
        );
        assert!(parse_ts("2026-03-02").is_err());
    }

    #[test]
    fn test_parse_opt_ts_treats_empty_as_null() {
        assert_eq!(parse_opt_ts(Some(String::new())).unwrap(), None);
        assert_eq!(parse_opt_ts(None).unwrap(), None);
        assert!(parse_opt_ts(Some("yesterday".into())).is_err());
    }
}
