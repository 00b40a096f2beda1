// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Loads configuration and definitions and assembles the reconciler.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use metasync_core::config::ClientConfig;
use metasync_core::error::{MetaError, Result};
use metasync_core::registry::{DefinitionRegistry, DefinitionSpec};
use metasync_engine::{DecisionPolicy, Reconciler};
use metasync_protocol::http_client::HttpTransport;
use metasync_protocol::{Endpoints, RetryConfig, ServerClient};
use metasync_store::{IdStore, ResponseJournal, SqliteIdStore};

use super::data_dir;

const CONFIG_FILE: &str = "config.json";
const ID_DATABASE: &str = "ids.db";

/// Read the configuration from `explicit`, else from the data directory,
/// else fall back to defaults. An explicit file must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<ClientConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = data_dir::data_dir().join(CONFIG_FILE);
            if !path.exists() {
                debug!(path = %path.display(), "no configuration file, using defaults");
                return Ok(ClientConfig::default());
            }
            path
        }
    };

    let data = std::fs::read_to_string(&path)?;
    serde_json::from_str(&data)
        .map_err(|e| MetaError::Config(format!("{}: {e}", path.display())))
}

/// Read the definitions file (a JSON array of definitions) into a registry.
/// Records without a `source` are keyed by file name and position so their
/// ids persist across runs.
pub fn load_definitions(path: &Path) -> Result<DefinitionRegistry> {
    let data = std::fs::read_to_string(path)?;
    let specs: Vec<DefinitionSpec> = serde_json::from_str(&data)
        .map_err(|e| MetaError::Config(format!("{}: {e}", path.display())))?;

    let mut registry = DefinitionRegistry::new();
    for (index, mut spec) in specs.into_iter().enumerate() {
        let origin = format!("{}#{index}", path.display());
        if let Some(oe) = spec.oe.as_mut() {
            default_source(&mut oe.source, &origin);
        }
        if let Some(vendor) = spec.vendor.as_mut() {
            default_source(&mut vendor.source, &origin);
        }
        if let Some(module) = spec.module.as_mut() {
            default_source(&mut module.source, &origin);
        }
        registry.register(spec);
    }
    info!(count = registry.len(), path = %path.display(), "definitions loaded");
    Ok(registry)
}

fn default_source(source: &mut String, origin: &str) {
    if source.is_empty() {
        *source = origin.to_string();
    }
}

/// Wire the HTTP transport, optional journal and identifier store.
pub fn build_reconciler(
    config: &ClientConfig,
    policy: Arc<dyn DecisionPolicy>,
) -> Result<Reconciler> {
    let transport = HttpTransport::new(&config.server)?;
    let endpoints = Endpoints::new(&config.server.base_url)?;
    let mut client = ServerClient::new(
        Arc::new(transport),
        endpoints,
        RetryConfig::from(config.retry.clone()),
    );
    if let Some(path) = &config.journal {
        info!(path = %path.display(), "journaling server responses");
        client = client.with_log(Arc::new(ResponseJournal::open(path)?));
    }

    let db = config
        .database
        .clone()
        .unwrap_or_else(|| data_dir::data_dir().join(ID_DATABASE));
    debug!(path = %db.display(), "opening identifier store");
    let store: Arc<dyn IdStore> = Arc::new(SqliteIdStore::open(&db)?);

    Ok(Reconciler::new(client, policy, config.options.clone(), store))
}

#[cfg(test)]
mod tests {
    use metasync_core::registry::SearchCriteria;

    use super::*;

    #[tokio::test]
    async fn definitions_get_stable_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("defs.json");
        std::fs::write(
            &path,
            r#"[
                {"module": {"name": "OpenSSL", "version": "3.0"},
                 "oe": {"env_name": "Linux 5.4", "manufacturer": "Intel"}},
                {"oe": {"env_name": "FreeBSD 14", "source": "bsd.json"}}
            ]"#,
        )
        .expect("write");

        let registry = load_definitions(&path).expect("load");
        assert_eq!(registry.len(), 2);

        let criteria = SearchCriteria {
            env_name: Some("Linux".into()),
            fuzzy: true,
            ..Default::default()
        };
        let (_, def) = registry.find(&criteria, None).expect("linux definition");
        let source = def.oe.as_ref().expect("oe").acquire().await.source.clone();
        assert_eq!(source, format!("{}#0", path.display()));

        let criteria = SearchCriteria {
            env_name: Some("FreeBSD 14".into()),
            ..Default::default()
        };
        let (_, def) = registry.find(&criteria, None).expect("bsd definition");
        let source = def.oe.as_ref().expect("oe").acquire().await.source.clone();
        assert_eq!(source, "bsd.json");
    }

    #[test]
    fn malformed_definitions_are_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("defs.json");
        std::fs::write(&path, r#"{"oe": {}}"#).expect("write");
        assert!(matches!(load_definitions(&path), Err(MetaError::Config(_))));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.json");
        assert!(matches!(load_config(Some(&missing)), Err(MetaError::Io(_))));

        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"server": {"base_url": "https://acvp.example/acvp/v1"},
                "options": {"non_interactive": true, "delete": ["oe"]}}"#,
        )
        .expect("write");
        let config = load_config(Some(&path)).expect("config");
        assert_eq!(config.server.base_url, "https://acvp.example/acvp/v1");
        assert_eq!(config.server.timeout_secs, 30);
        assert!(config.options.non_interactive);
        assert!(config.options.deletes(metasync_core::config::Scope::Oe));
    }
}
