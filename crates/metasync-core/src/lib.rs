// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metasync core: types, identifier codec, entity locks, and error
// definitions shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod id;
pub mod lock;
pub mod registry;
pub mod types;

pub use config::ClientConfig;
pub use error::{MetaError, Result};
pub use id::{EntityId, RequestState};
pub use lock::{EntityLock, LockGuard};
pub use registry::{Cursor, DefinitionRegistry, SearchCriteria};
pub use types::*;
