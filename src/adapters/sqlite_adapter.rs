//! SQLite price history store.
//!
//! Minute observations live in `price_history`, keyed on
//! (as_at, ticker, currency). Missing prices are stored as NULL.

use crate::adapters::csv_adapter::TIMESTAMP_FORMAT;
use crate::domain::error::TrendsimError;
use crate::domain::ingest::{plan_upsert, ObservationKey, UpsertPlan};
use crate::domain::observation::{InstrumentMeta, PriceObservation};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDateTime;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::collections::HashSet;
use tracing::{debug, info};

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> TrendsimError {
    TrendsimError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, TrendsimError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|e| TrendsimError::Database {
        reason: format!("invalid as_at '{}': {}", value, e),
    })
}

fn nullable(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TrendsimError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TrendsimError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| TrendsimError::Database {
                    reason: e.to_string(),
                })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, TrendsimError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| TrendsimError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TrendsimError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| TrendsimError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), TrendsimError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS price_history (
                as_at TEXT NOT NULL,
                ticker TEXT NOT NULL,
                currency TEXT NOT NULL,
                high REAL,
                low REAL,
                open REAL,
                close REAL,
                volume REAL,
                instrument_type TEXT NOT NULL DEFAULT '',
                exchange_name TEXT NOT NULL DEFAULT '',
                time_zone TEXT NOT NULL DEFAULT '',
                gmt_offset INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (as_at, ticker, currency)
            );
            CREATE INDEX IF NOT EXISTS idx_price_history_ticker ON price_history(ticker, as_at);",
        )
        .map_err(query_err)?;

        Ok(())
    }

    /// Keys already stored for `ticker` in `from..to`.
    pub fn existing_keys(
        &self,
        ticker: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<HashSet<ObservationKey>, TrendsimError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT as_at, ticker, currency FROM price_history
                 WHERE ticker = ?1 AND as_at >= ?2 AND as_at < ?3",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    ticker,
                    from.format(TIMESTAMP_FORMAT).to_string(),
                    to.format(TIMESTAMP_FORMAT).to_string()
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .map_err(query_err)?;

        let mut keys = HashSet::new();
        for row in rows {
            let (as_at, ticker, currency) = row.map_err(query_err)?;
            keys.insert(ObservationKey::new(parse_timestamp(&as_at)?, &ticker, &currency));
        }
        Ok(keys)
    }

    /// Merges `observations` into the store, skipping rows already held.
    pub fn upsert(&self, observations: Vec<PriceObservation>) -> Result<UpsertPlan, TrendsimError> {
        let Some(from) = observations.iter().map(|o| o.timestamp).min() else {
            return Ok(UpsertPlan::default());
        };
        let to = observations
            .iter()
            .map(|o| o.timestamp)
            .max()
            .unwrap_or(from)
            + chrono::Duration::seconds(1);

        let mut existing = HashSet::new();
        let tickers: HashSet<&str> = observations.iter().map(|o| o.ticker.as_str()).collect();
        for ticker in tickers {
            existing.extend(self.existing_keys(ticker, from, to)?);
        }

        let plan = plan_upsert(&existing, observations)?;
        debug!(
            inserts = plan.inserts.len(),
            already_stored = plan.already_stored,
            incomplete = plan.incomplete,
            "upsert plan"
        );
        self.insert(&plan.inserts)?;
        info!(rows = plan.inserts.len(), "price history updated");
        Ok(plan)
    }

    pub fn insert(&self, observations: &[PriceObservation]) -> Result<(), TrendsimError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for obs in observations {
            tx.execute(
                "INSERT INTO price_history (as_at, ticker, currency, high, low, open, close, volume,
                     instrument_type, exchange_name, time_zone, gmt_offset)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    obs.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    obs.ticker,
                    obs.currency,
                    nullable(obs.high),
                    nullable(obs.low),
                    nullable(obs.open),
                    nullable(obs.close),
                    nullable(obs.volume),
                    obs.instrument.instrument_type,
                    obs.instrument.exchange_name,
                    obs.instrument.time_zone,
                    obs.instrument.gmt_offset
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }
}

impl PriceDataPort for SqliteAdapter {
    fn fetch_prices(
        &self,
        ticker: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<PriceObservation>, TrendsimError> {
        let conn = self.conn()?;

        let query = "SELECT as_at, ticker, currency, high, low, open, close, volume,
                            instrument_type, exchange_name, time_zone, gmt_offset
                     FROM price_history
                     WHERE ticker = ?1 AND as_at >= ?2 AND as_at < ?3
                     ORDER BY as_at ASC";

        let mut stmt = conn.prepare(query).map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    ticker,
                    from.format(TIMESTAMP_FORMAT).to_string(),
                    to.format(TIMESTAMP_FORMAT).to_string()
                ],
                |row| {
                    let as_at: String = row.get(0)?;
                    let timestamp =
                        NaiveDateTime::parse_from_str(&as_at, TIMESTAMP_FORMAT).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                as_at.len(),
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?;
                    let price = |idx: usize| -> rusqlite::Result<f64> {
                        Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
                    };
                    Ok(PriceObservation {
                        timestamp,
                        ticker: row.get(1)?,
                        currency: row.get(2)?,
                        high: price(3)?,
                        low: price(4)?,
                        open: price(5)?,
                        close: price(6)?,
                        volume: price(7)?,
                        instrument: InstrumentMeta {
                            instrument_type: row.get(8)?,
                            exchange_name: row.get(9)?,
                            time_zone: row.get(10)?,
                            gmt_offset: row.get(11)?,
                        },
                    })
                },
            )
            .map_err(query_err)?;

        let mut observations = Vec::new();
        for row in rows {
            observations.push(row.map_err(query_err)?);
        }

        Ok(observations)
    }

    fn list_tickers(&self) -> Result<Vec<String>, TrendsimError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT ticker FROM price_history ORDER BY ticker")
            .map_err(query_err)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;

        let mut tickers = Vec::new();
        for row in rows {
            tickers.push(row.map_err(query_err)?);
        }

        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TrendsimError> {
        let conn = self.conn()?;

        let query = "SELECT MIN(as_at), MAX(as_at), COUNT(*) FROM price_history WHERE ticker = ?1";

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(query, params![ticker], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(query_err)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => Ok(Some((
                parse_timestamp(&min_str)?,
                parse_timestamp(&max_str)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}
