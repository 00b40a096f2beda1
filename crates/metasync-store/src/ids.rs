// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persisted identifier state.
//
// Each record's server identifiers are stored independently per slot, so a
// run that fails halfway keeps whatever it already registered and the next
// run resumes from there. Values are stored in their packed 32-bit form.
//
// Schema:
//   entity_ids(
//     record      TEXT    NOT NULL,   -- RecordKey, e.g. "oe:linux.json"
//     field       TEXT    NOT NULL,   -- IdField name
//     raw         INTEGER NOT NULL,   -- packed identifier
//     updated_at  TEXT    NOT NULL,   -- RFC 3339
//     PRIMARY KEY (record, field)
//   )

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::{debug, info, instrument, warn};

use metasync_core::error::{MetaError, Result};
use metasync_core::id::EntityId;
use metasync_core::types::{IdField, IdRecord, RecordKey};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS entity_ids (
        record     TEXT    NOT NULL,
        field      TEXT    NOT NULL,
        raw        INTEGER NOT NULL,
        updated_at TEXT    NOT NULL,
        PRIMARY KEY (record, field)
    )
"#;

fn db_err(e: rusqlite::Error) -> MetaError {
    MetaError::Database(e.to_string())
}

/// Storage of identifiers per record. Called only while the record's
/// entity lock is held.
pub trait IdStore: Send + Sync {
    /// Stored slots of `key`; slots never saved are absent.
    fn load(&self, key: &RecordKey) -> Result<Vec<(IdField, EntityId)>>;

    fn save(&self, key: &RecordKey, ids: &[(IdField, EntityId)]) -> Result<()>;
}

/// Overwrite the record's identifiers with the stored ones.
pub fn load_into<R: IdRecord + ?Sized>(store: &dyn IdStore, record: &mut R) -> Result<()> {
    let key = record.record_key();
    for (field, id) in store.load(&key)? {
        record.set_id(field, id);
    }
    Ok(())
}

pub fn save_from<R: IdRecord + ?Sized>(store: &dyn IdStore, record: &R) -> Result<()> {
    store.save(&record.record_key(), &record.id_fields())
}

/// SQLite-backed identifier store.
pub struct SqliteIdStore {
    conn: Mutex<Connection>,
}

impl SqliteIdStore {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| MetaError::Database(format!("WAL pragma: {e}")))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| MetaError::Database(format!("create table: {e}")))?;

        info!("identifier database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| MetaError::Database(format!("create table: {e}")))?;
        debug!("in-memory identifier database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MetaError::Database("connection mutex poisoned".into()))
    }
}

impl IdStore for SqliteIdStore {
    #[instrument(skip(self), fields(record = %key))]
    fn load(&self, key: &RecordKey) -> Result<Vec<(IdField, EntityId)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT field, raw FROM entity_ids WHERE record = ?1")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![key.0], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })
            .map_err(db_err)?;

        let mut ids = Vec::new();
        for row in rows {
            let (field, raw) = row.map_err(db_err)?;
            match IdField::parse(&field) {
                Some(field) => ids.push((field, EntityId::from_raw(raw))),
                None => warn!(field, "ignoring unknown identifier slot"),
            }
        }
        debug!(count = ids.len(), "identifiers loaded");
        Ok(ids)
    }

    #[instrument(skip(self, ids), fields(record = %key))]
    fn save(&self, key: &RecordKey, ids: &[(IdField, EntityId)]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let now = Utc::now().to_rfc3339();
        for (field, id) in ids {
            tx.execute(
                "INSERT INTO entity_ids (record, field, raw, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(record, field) DO UPDATE SET raw = ?3, updated_at = ?4",
                params![key.0, field.as_str(), id.to_raw(), now],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        debug!(count = ids.len(), "identifiers saved");
        Ok(())
    }
}

/// Volatile store for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryIdStore {
    ids: Mutex<HashMap<RecordKey, HashMap<IdField, EntityId>>>,
}

impl MemoryIdStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdStore for MemoryIdStore {
    fn load(&self, key: &RecordKey) -> Result<Vec<(IdField, EntityId)>> {
        let ids = self
            .ids
            .lock()
            .map_err(|_| MetaError::Database("memory store poisoned".into()))?;
        Ok(ids
            .get(key)
            .map(|slots| slots.iter().map(|(f, id)| (*f, *id)).collect())
            .unwrap_or_default())
    }

    fn save(&self, key: &RecordKey, ids: &[(IdField, EntityId)]) -> Result<()> {
        let mut all = self
            .ids
            .lock()
            .map_err(|_| MetaError::Database("memory store poisoned".into()))?;
        all.entry(key.clone()).or_default().extend(ids.iter().copied());
        Ok(())
    }
}
