//! Persistent preference store: known AP records, their preferred order,
//! and a handful of scalar preferences (scan interval, RSSI scan interval).
//!
//! Grounded in `original_source/ifscand/db.c`, which keeps all of this in a
//! single NDBM file shared by every `ifscand` instance and the CLI client,
//! relying on the file's own locking and an `fsync` after each write. This
//! rendition swaps NDBM for a local SQLite file: `rusqlite`'s `bundled`
//! feature needs no system libsqlite3, and SQLite's file locking gives the
//! same multi-process safety guarantee NDBM provided (`sled`, the other
//! obvious embedded choice, explicitly disallows concurrent multi-process
//! access, which rules it out here).

mod rank;
mod record_codec;

pub use rank::filter_and_rank;

use crate::error::StoreError;
use crate::model::AccessPointRecord;
use rusqlite::{params, Connection};

/// The operations the scheduler and control protocol need from the
/// preference store. Kept as a trait so tests can swap in an in-memory
/// double without touching a real file.
pub trait PrefStore {
    fn put_ap(&self, record: &AccessPointRecord) -> Result<(), StoreError>;
    fn delete_ap(&self, ssid: &str) -> Result<bool, StoreError>;
    fn get_ap(&self, ssid: &str) -> Result<Option<AccessPointRecord>, StoreError>;
    fn list_aps(&self) -> Result<Vec<AccessPointRecord>, StoreError>;

    fn set_ap_order(&self, order: &[String]) -> Result<(), StoreError>;
    fn get_ap_order(&self) -> Result<Vec<String>, StoreError>;

    fn set_pref(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn get_pref(&self, key: &str) -> Result<Option<String>, StoreError>;
}

const AP_ORDER_KEY: &str = "__ap_order__";

/// SQLite-backed [`PrefStore`]. Every mutating call commits before
/// returning, matching "every write is flushed" from the data model.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &std::path::Path) -> Result<SqliteStore, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.pragma_update(None, "journal_mode", "DELETE")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ap_records (ssid TEXT PRIMARY KEY, data BLOB NOT NULL)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory store. Used by tests that want real SQL semantics
    /// without touching the filesystem.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<SqliteStore, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ap_records (ssid TEXT PRIMARY KEY, data BLOB NOT NULL)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(SqliteStore { conn })
    }
}

impl PrefStore for SqliteStore {
    fn put_ap(&self, record: &AccessPointRecord) -> Result<(), StoreError> {
        record
            .validate()
            .map_err(StoreError::InvalidRecord)?;
        let bytes = record_codec::encode(record)?;
        self.conn.execute(
            "INSERT INTO ap_records (ssid, data) VALUES (?1, ?2)
             ON CONFLICT(ssid) DO UPDATE SET data = excluded.data",
            params![record.ssid, bytes],
        )?;
        Ok(())
    }

    fn delete_ap(&self, ssid: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM ap_records WHERE ssid = ?1", params![ssid])?;
        Ok(removed > 0)
    }

    fn get_ap(&self, ssid: &str) -> Result<Option<AccessPointRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM ap_records WHERE ssid = ?1")?;
        let mut rows = stmt.query(params![ssid])?;
        match rows.next()? {
            Some(row) => {
                let bytes: Vec<u8> = row.get(0)?;
                Ok(Some(record_codec::decode(ssid, &bytes)?))
            }
            None => Ok(None),
        }
    }

    fn list_aps(&self) -> Result<Vec<AccessPointRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT ssid, data FROM ap_records ORDER BY ssid")?;
        let rows = stmt.query_map([], |row| {
            let ssid: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((ssid, bytes))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (ssid, bytes) = row?;
            out.push(record_codec::decode(&ssid, &bytes)?);
        }
        Ok(out)
    }

    fn set_ap_order(&self, order: &[String]) -> Result<(), StoreError> {
        let joined = order.join("\n");
        self.set_pref(AP_ORDER_KEY, &joined)
    }

    fn get_ap_order(&self) -> Result<Vec<String>, StoreError> {
        match self.get_pref(AP_ORDER_KEY)? {
            Some(joined) if !joined.is_empty() => {
                Ok(joined.lines().map(str::to_string).collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn set_pref(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_pref(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AuthMode;

    #[test]
    fn put_then_get_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut rec = AccessPointRecord::new("homenet");
        rec.auth_mode = AuthMode::Wpa;
        rec.key = b"correcthorsebatterystaple".to_vec();

        store.put_ap(&rec).unwrap();
        let back = store.get_ap("homenet").unwrap().unwrap();
        assert_eq!(rec, back);
    }

    #[test]
    fn put_twice_overwrites_not_duplicates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut rec = AccessPointRecord::new("homenet");
        store.put_ap(&rec).unwrap();
        rec.auth_mode = AuthMode::Wep;
        rec.key = b"abcde".to_vec();
        store.put_ap(&rec).unwrap();

        let all = store.list_aps().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].auth_mode, AuthMode::Wep);
    }

    #[test]
    fn delete_reports_whether_it_existed() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put_ap(&AccessPointRecord::new("homenet")).unwrap();
        assert!(store.delete_ap("homenet").unwrap());
        assert!(!store.delete_ap("homenet").unwrap());
    }

    #[test]
    fn ap_order_round_trips_and_defaults_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get_ap_order().unwrap(), Vec::<String>::new());

        let order = vec!["a".to_string(), "b".to_string()];
        store.set_ap_order(&order).unwrap();
        assert_eq!(store.get_ap_order().unwrap(), order);
    }

    #[test]
    fn get_pref_distinguishes_unset_from_zero() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get_pref("scan_interval_sec").unwrap(), None);

        store.set_pref("scan_interval_sec", "0").unwrap();
        assert_eq!(
            store.get_pref("scan_interval_sec").unwrap(),
            Some("0".to_string())
        );
    }

    #[test]
    fn rejects_invalid_record_on_put() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut rec = AccessPointRecord::new("homenet");
        rec.auth_mode = AuthMode::Wpa;
        rec.key = b"short".to_vec();
        assert!(store.put_ap(&rec).is_err());
    }
}
