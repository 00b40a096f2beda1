// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client configuration.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persistent client settings, read from `config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub options: SyncOptions,
    pub retry: RetrySettings,
    /// Identifier database. Defaults to `<data dir>/metasync/ids.db`.
    pub database: Option<PathBuf>,
    /// Response journal database; journaling is off when absent.
    pub journal: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL including the protocol prefix, e.g. `https://host/acvp/v1`.
    pub base_url: String,
    pub timeout_secs: u64,
    pub bearer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://demo.acvts.nist.gov/acvp/v1".into(),
            timeout_secs: 30,
            bearer_token: None,
        }
    }
}

/// Record kinds an explicit update/delete request can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Oe,
    Vendor,
    Module,
    Person,
}

/// Behaviour switches of one reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Print the payloads that would be registered; never submit.
    pub dry_run: bool,
    /// Submit without asking, after printing the payload.
    pub non_interactive: bool,
    /// Search and report only.
    pub show_db_entries: bool,
    pub delete: BTreeSet<Scope>,
    pub update: BTreeSet<Scope>,
}

impl SyncOptions {
    pub fn deletes(&self, scope: Scope) -> bool {
        self.delete.contains(&scope)
    }

    pub fn updates(&self, scope: Scope) -> bool {
        self.update.contains(&scope)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: ClientConfig = serde_json::from_str(
            r#"{"server":{"base_url":"https://acvp.example/acvp/v1"},"options":{"delete":["oe"]}}"#,
        )
        .expect("parse config");
        assert_eq!(cfg.server.base_url, "https://acvp.example/acvp/v1");
        assert_eq!(cfg.server.timeout_secs, 30);
        assert!(cfg.options.deletes(Scope::Oe));
        assert!(!cfg.options.updates(Scope::Oe));
        assert_eq!(cfg.retry.max_retries, 3);
        assert!(cfg.journal.is_none());
    }
}
