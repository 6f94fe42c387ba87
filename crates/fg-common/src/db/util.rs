#![allow(async_fn_in_trait)]

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use deadpool_postgres::GenericClient;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use tracing::warn;

pub const SLOW_QUERY_ENV: &str = "FG_DB_LOG_MIN_DURATION_MS";

pub type Params<'a> = &'a [&'a (dyn ToSql + Sync)];

fn parse_threshold(raw: Option<&str>) -> Option<Duration> {
    raw?.trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

fn slow_query_threshold() -> Option<Duration> {
    static THRESHOLD: OnceLock<Option<Duration>> = OnceLock::new();
    *THRESHOLD.get_or_init(|| parse_threshold(std::env::var(SLOW_QUERY_ENV).ok().as_deref()))
}

fn report_if_slow(label: &str, started: Instant) {
    let Some(threshold) = slow_query_threshold() else {
        return;
    };
    let elapsed = started.elapsed();
    if elapsed >= threshold {
        warn!(query = label, elapsed_ms = elapsed.as_millis() as u64, "slow query");
    }
}

/// Prepared-statement helpers that warn when a statement takes longer than
/// `FG_DB_LOG_MIN_DURATION_MS`.
pub trait TimedClientExt: GenericClient {
    async fn timed_query(
        &self,
        sql: &str,
        params: Params<'_>,
        label: &str,
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        let started = Instant::now();
        let statement = self.prepare_cached(sql).await?;
        let rows = self.query(&statement, params).await;
        report_if_slow(label, started);
        rows
    }

    async fn timed_query_opt(
        &self,
        sql: &str,
        params: Params<'_>,
        label: &str,
    ) -> Result<Option<Row>, tokio_postgres::Error> {
        let started = Instant::now();
        let statement = self.prepare_cached(sql).await?;
        let row = self.query_opt(&statement, params).await;
        report_if_slow(label, started);
        row
    }

    async fn timed_execute(
        &self,
        sql: &str,
        params: Params<'_>,
        label: &str,
    ) -> Result<u64, tokio_postgres::Error> {
        let started = Instant::now();
        let statement = self.prepare_cached(sql).await?;
        let affected = self.execute(&statement, params).await;
        report_if_slow(label, started);
        affected
    }
}

impl<T: GenericClient + ?Sized> TimedClientExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_parsing() {
        assert_eq!(parse_threshold(Some("250")), Some(Duration::from_millis(250)));
        assert_eq!(parse_threshold(Some(" 5 ")), Some(Duration::from_millis(5)));
        assert_eq!(parse_threshold(Some("0")), None);
        assert_eq!(parse_threshold(Some("-3")), None);
        assert_eq!(parse_threshold(Some("soon")), None);
        assert_eq!(parse_threshold(None), None);
    }
}
