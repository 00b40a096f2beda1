// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metasync store: local persistence of server identifiers per record and an
// optional journal of server responses.

pub mod ids;
pub mod journal;

pub use ids::{IdStore, MemoryIdStore, SqliteIdStore, load_into, save_from};
pub use journal::{JournalEntry, ResponseJournal};
