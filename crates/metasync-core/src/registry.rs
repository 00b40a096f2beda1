// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Definition registry.
//
// A definition bundles the module, vendor and OE records of one tested
// implementation together with the names of its algorithm capabilities.
// Definitions are appended during startup and never reordered; afterwards
// the registry is only read, so it needs no lock of its own. The records
// inside each definition are guarded by their own `EntityLock`.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::lock::EntityLock;
use crate::types::{ModuleRecord, OeRecord, VendorRecord};

/// One registered implementation.
#[derive(Debug)]
pub struct Definition {
    pub module: Option<Arc<EntityLock<ModuleRecord>>>,
    pub vendor: Option<Arc<EntityLock<VendorRecord>>>,
    pub oe: Option<Arc<EntityLock<OeRecord>>>,
    pub algorithms: Vec<String>,
    keys: SearchKeys,
}

/// Immutable copy of the searchable fields, taken at registration so a
/// search never has to lock a record another workflow may be holding.
#[derive(Debug, Clone, Default)]
struct SearchKeys {
    module_name: Option<String>,
    module_version: Option<String>,
    vendor_name: Option<String>,
    env_name: Option<String>,
    processor: Option<String>,
}

/// On-disk form of a definition, as found in the definitions file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DefinitionSpec {
    pub module: Option<ModuleRecord>,
    pub vendor: Option<VendorRecord>,
    pub oe: Option<OeRecord>,
    pub algorithms: Vec<String>,
}

impl Definition {
    pub fn new(spec: DefinitionSpec) -> Self {
        let keys = SearchKeys {
            module_name: spec.module.as_ref().map(|m| m.name.clone()),
            module_version: spec.module.as_ref().and_then(|m| m.version.clone()),
            vendor_name: spec.vendor.as_ref().map(|v| v.name.clone()),
            env_name: spec.oe.as_ref().and_then(|o| o.env_name.clone()),
            processor: spec
                .oe
                .as_ref()
                .and_then(|o| o.proc_family_internal.clone().or_else(|| o.proc_family.clone())),
        };
        Self {
            module: spec.module.map(|m| Arc::new(EntityLock::new(m))),
            vendor: spec.vendor.map(|v| Arc::new(EntityLock::new(v))),
            oe: spec.oe.map(|o| Arc::new(EntityLock::new(o))),
            algorithms: spec.algorithms,
            keys,
        }
    }

    /// Human label for log lines.
    pub fn label(&self) -> String {
        match (&self.keys.module_name, &self.keys.env_name) {
            (Some(m), Some(e)) => format!("{m} on {e}"),
            (Some(m), None) => m.clone(),
            (None, Some(e)) => e.clone(),
            (None, None) => "unnamed definition".into(),
        }
    }
}

/// Search filter. Absent fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub module_name: Option<String>,
    pub module_version: Option<String>,
    pub vendor_name: Option<String>,
    pub env_name: Option<String>,
    pub processor: Option<String>,
    /// Substring instead of exact comparison.
    pub fuzzy: bool,
}

impl SearchCriteria {
    fn field_matches(&self, wanted: &Option<String>, have: &Option<String>) -> bool {
        let Some(wanted) = wanted else {
            return true;
        };
        let Some(have) = have else {
            return false;
        };
        if self.fuzzy {
            have.contains(wanted.as_str())
        } else {
            have == wanted
        }
    }

    fn matches(&self, keys: &SearchKeys) -> bool {
        self.field_matches(&self.module_name, &keys.module_name)
            && self.field_matches(&self.module_version, &keys.module_version)
            && self.field_matches(&self.vendor_name, &keys.vendor_name)
            && self.field_matches(&self.env_name, &keys.env_name)
            && self.field_matches(&self.processor, &keys.processor)
    }
}

/// Position of a definition in the registry, used to resume a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(usize);

/// Append-only sequence of definitions.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    defs: Vec<Arc<Definition>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: DefinitionSpec) -> Cursor {
        let def = Definition::new(spec);
        debug!(definition = %def.label(), "definition registered");
        self.defs.push(Arc::new(def));
        Cursor(self.defs.len() - 1)
    }

    /// First definition matching `criteria` strictly after `after`, or from
    /// the start when no cursor is given.
    pub fn find(
        &self,
        criteria: &SearchCriteria,
        after: Option<Cursor>,
    ) -> Option<(Cursor, Arc<Definition>)> {
        let start = after.map_or(0, |Cursor(i)| i + 1);
        self.defs
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, def)| criteria.matches(&def.keys))
            .map(|(i, def)| (Cursor(i), Arc::clone(def)))
    }

    /// All definitions matching `criteria`, in registration order.
    pub fn find_all(&self, criteria: &SearchCriteria) -> Vec<Arc<Definition>> {
        let mut found = Vec::new();
        let mut cursor = None;
        while let Some((at, def)) = self.find(criteria, cursor) {
            found.push(def);
            cursor = Some(at);
        }
        found
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Definition>> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(module: &str, env: &str) -> DefinitionSpec {
        DefinitionSpec {
            module: Some(ModuleRecord {
                name: module.into(),
                version: Some("1.0".into()),
                ..Default::default()
            }),
            oe: Some(OeRecord {
                env_name: Some(env.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn registry() -> DefinitionRegistry {
        let mut reg = DefinitionRegistry::new();
        reg.register(spec("OpenSSL", "Linux 5.4"));
        reg.register(spec("OpenSSL FIPS", "Linux 5.4"));
        reg.register(spec("OpenSSL", "Windows 10"));
        reg
    }

    #[test]
    fn cursor_resumes_after_previous_hit() {
        let reg = registry();
        let criteria = SearchCriteria {
            module_name: Some("OpenSSL".into()),
            ..Default::default()
        };

        let (first, def) = reg.find(&criteria, None).expect("first hit");
        assert_eq!(def.label(), "OpenSSL on Linux 5.4");
        let (second, def) = reg.find(&criteria, Some(first)).expect("second hit");
        assert_eq!(def.label(), "OpenSSL on Windows 10");
        assert!(reg.find(&criteria, Some(second)).is_none());
    }

    #[test]
    fn fuzzy_matches_substrings() {
        let reg = registry();
        let mut criteria = SearchCriteria {
            module_name: Some("SSL".into()),
            ..Default::default()
        };
        assert!(reg.find_all(&criteria).is_empty());
        criteria.fuzzy = true;
        assert_eq!(reg.find_all(&criteria).len(), 3);
    }

    #[test]
    fn empty_criteria_match_everything() {
        let reg = registry();
        assert_eq!(reg.find_all(&SearchCriteria::default()).len(), reg.len());
    }

    #[test]
    fn missing_field_never_matches_a_constraint() {
        let mut reg = DefinitionRegistry::new();
        reg.register(DefinitionSpec::default());
        let criteria = SearchCriteria {
            vendor_name: Some("Acme".into()),
            ..Default::default()
        };
        assert!(reg.find(&criteria, None).is_none());
    }
}
