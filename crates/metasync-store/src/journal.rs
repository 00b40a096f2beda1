// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Response journal: append-only SQLite log of every server exchange.
//
// Schema:
//   responses(
//     id          INTEGER PRIMARY KEY AUTOINCREMENT,
//     session     TEXT    NOT NULL,   -- UUID of the client run
//     timestamp   TEXT    NOT NULL,   -- RFC 3339
//     verb        TEXT    NOT NULL,
//     url         TEXT    NOT NULL,
//     status      INTEGER NOT NULL,
//     body_sha256 TEXT    NOT NULL,
//     body        TEXT    NOT NULL
//   )

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use uuid::Uuid;

use metasync_core::error::{MetaError, Result};
use metasync_protocol::transport::{HttpVerb, Response, ResponseLog};

const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS responses (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        session     TEXT    NOT NULL,
        timestamp   TEXT    NOT NULL,
        verb        TEXT    NOT NULL,
        url         TEXT    NOT NULL,
        status      INTEGER NOT NULL,
        body_sha256 TEXT    NOT NULL,
        body        TEXT    NOT NULL
    );";

fn db_err(e: rusqlite::Error) -> MetaError {
    MetaError::Database(e.to_string())
}

/// One journaled exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub session: String,
    pub timestamp: String,
    pub verb: String,
    pub url: String,
    pub status: u16,
    pub body_sha256: String,
    pub body: String,
}

pub struct ResponseJournal {
    conn: Mutex<Connection>,
    session: Uuid,
}

impl ResponseJournal {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(db_err)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(db_err)?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;
        let session = Uuid::new_v4();
        debug!(%session, "response journal opened");
        Ok(Self {
            conn: Mutex::new(conn),
            session,
        })
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MetaError::Database("journal mutex poisoned".into()))
    }

    /// Entries of this run, oldest first.
    pub fn entries(&self) -> Result<Vec<JournalEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, session, timestamp, verb, url, status, body_sha256, body
                 FROM responses WHERE session = ?1 ORDER BY id ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![self.session.to_string()], |row| {
                Ok(JournalEntry {
                    id: row.get(0)?,
                    session: row.get(1)?,
                    timestamp: row.get(2)?,
                    verb: row.get(3)?,
                    url: row.get(4)?,
                    status: row.get(5)?,
                    body_sha256: row.get(6)?,
                    body: row.get(7)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_err)
    }
}

impl ResponseLog for ResponseJournal {
    fn record(&self, verb: HttpVerb, url: &str, response: &Response) -> Result<()> {
        let digest = hex::encode(Sha256::digest(&response.body));
        self.conn()?
            .execute(
                "INSERT INTO responses (session, timestamp, verb, url, status, body_sha256, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    self.session.to_string(),
                    Utc::now().to_rfc3339(),
                    verb.as_str(),
                    url,
                    response.status,
                    digest,
                    response.body_text(),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }
}
