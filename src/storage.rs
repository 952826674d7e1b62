use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

/// The most recent known resolution of one domain.
///
/// Exactly one record exists per distinct domain; repeated lookups overwrite
/// `addresses` and `lookup_time` in place.
#[derive(Debug, Clone, Serialize)]
pub struct LookupRecord {
    pub id: i64,
    pub domain: String,
    pub addresses: Vec<String>,
    pub lookup_time: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("address list encoding failed: {0}")]
    Codec(#[from] serde_json::Error),
}

/// SQLite-backed store for lookup records.
///
/// `addresses` is serialized to JSON inside this layer only; callers always
/// see a native `Vec<String>`. The UNIQUE constraint on `domain` plus the
/// ON CONFLICT clause in [`LookupStore::upsert`] is what keeps concurrent
/// upserts for the same domain from ever creating two rows.
#[derive(Clone)]
pub struct LookupStore {
    conn: Arc<Mutex<Connection>>,
}

impl LookupStore {
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;

        let _: String = conn.query_row("PRAGMA journal_mode=WAL;", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS lookups (
                id INTEGER PRIMARY KEY,
                domain TEXT NOT NULL UNIQUE,
                addresses TEXT NOT NULL,
                lookup_time INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_lookup_time ON lookups(lookup_time)",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Exact-match lookup by domain, case-sensitive as stored.
    pub fn find_by_domain(&self, domain: &str) -> Result<Option<LookupRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT id, domain, addresses, lookup_time FROM lookups WHERE domain = ?1",
                [domain],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Create-if-absent-else-update keyed by domain.
    ///
    /// `lookup_time` is set to now (UTC) on both paths. The existence check
    /// and the write happen in a single statement, so two racing upserts for
    /// the same domain resolve to one row with last-writer-wins fields.
    pub fn upsert(
        &self,
        domain: &str,
        addresses: &[Ipv4Addr],
    ) -> Result<LookupRecord, StoreError> {
        let addrs: Vec<String> = addresses.iter().map(|a| a.to_string()).collect();
        let encoded = serde_json::to_string(&addrs)?;
        let now = Utc::now().timestamp_micros();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO lookups (domain, addresses, lookup_time)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(domain) DO UPDATE SET
                 addresses = excluded.addresses,
                 lookup_time = excluded.lookup_time",
            params![domain, encoded, now],
        )?;

        let record = conn.query_row(
            "SELECT id, domain, addresses, lookup_time FROM lookups WHERE domain = ?1",
            [domain],
            row_to_record,
        )?;
        Ok(record)
    }

    /// Up to `limit` records, most recent `lookup_time` first; ties keep
    /// insertion order. An empty store yields an empty vec.
    pub fn recent(&self, limit: usize) -> Result<Vec<LookupRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, domain, addresses, lookup_time
             FROM lookups ORDER BY lookup_time DESC, id ASC LIMIT ?1",
        )?;

        let rows = stmt.query_map([limit], row_to_record)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<LookupRecord> {
    let raw: String = row.get(2)?;
    let addresses: Vec<String> = serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    let micros: i64 = row.get(3)?;
    let lookup_time = DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, micros))?;

    Ok(LookupRecord {
        id: row.get(0)?,
        domain: row.get(1)?,
        addresses,
        lookup_time,
    })
}
