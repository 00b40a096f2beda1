// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operational environment builder and matcher.
//
// The server requires a unique, readable OE name. It is derived from the
// execution environment and the processor, e.g.
//   "Linux 5.4 on Intel Skylake i7-6700"
// so the processor name is left out when the series already starts with it.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use metasync_core::error::{MetaError, Result};
use metasync_core::id::EntityId;
use metasync_core::types::OeRecord;
use metasync_protocol::endpoint::{Endpoints, Resource, trailing_number};
use metasync_protocol::envelope::type_name;

use crate::dependency::{
    TYPE_PROCESSOR, TYPE_SOFTWARE, build_processor, build_software, field_matches,
    match_processor, match_software, remote_id, remote_str,
};
use crate::entity::MatchOutcome;

/// Generated OE name.
pub fn oe_name(oe: &OeRecord) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(env) = oe.env_name.as_deref() {
        parts.push(env);
        if oe.manufacturer.is_some() || oe.proc_series.is_some() || oe.proc_name.is_some() {
            parts.push("on");
        }
    }
    if let Some(manufacturer) = oe.manufacturer.as_deref() {
        parts.push(manufacturer);
    }
    match (oe.proc_series.as_deref(), oe.proc_name.as_deref()) {
        (Some(series), Some(name)) => {
            parts.push(series);
            if !series.starts_with(name) {
                parts.push(name);
            }
        }
        (Some(series), None) => parts.push(series),
        (None, Some(name)) => parts.push(name),
        (None, None) => {}
    }
    parts.join(" ")
}

/// Canonical OE object. Dependencies with a final id are referenced through
/// `dependencyUrls`; all others are sent inline in `dependencies`.
pub fn build_oe(oe: &OeRecord, endpoints: &Endpoints) -> Value {
    let mut urls = Vec::new();
    let mut inline = Vec::new();

    match oe.proc_id.server_id() {
        Some(id) => urls.push(Value::from(endpoints.record_path(Resource::Dependencies, id))),
        None => inline.extend(build_processor(oe)),
    }

    if oe.env_name.is_none() {
        if !oe.sw_id.is_unset() {
            warn!(
                sw_id = %oe.sw_id,
                "no execution environment named but a software dependency id is configured; \
                 the software dependency is not reported"
            );
        }
    } else {
        match oe.sw_id.server_id() {
            Some(id) => urls.push(Value::from(endpoints.record_path(Resource::Dependencies, id))),
            None => inline.extend(build_software(oe)),
        }
    }

    let name = oe_name(oe);
    let mut obj = Map::new();
    obj.insert("name".into(), Value::from(name.as_str()));
    if urls.is_empty() && inline.is_empty() {
        warn!(oe = %name, "no dependencies found for OE");
    }
    if !urls.is_empty() {
        obj.insert("dependencyUrls".into(), Value::Array(urls));
    }
    if !inline.is_empty() {
        obj.insert("dependencies".into(), Value::Array(inline));
    }
    Value::Object(obj)
}

/// Result of matching the OE object itself, before any linked dependency
/// was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OeMatch {
    pub outcome: MatchOutcome,
    /// Dependency records referenced by URL that still need to be checked.
    pub dependency_ids: Vec<u32>,
}

/// Match a remote OE by name, then check its inline dependencies. A
/// dependency that differs from the local one clears the corresponding local
/// id so it gets registered again; it does not fail the OE match.
pub fn match_oe(oe: &mut OeRecord, remote: &Value) -> Result<OeMatch> {
    let name = oe_name(oe);
    if !field_matches(Some(&name), remote, "name")? {
        return Ok(OeMatch {
            outcome: MatchOutcome::NotFound,
            dependency_ids: Vec::new(),
        });
    }

    let id = remote_id(remote)?;
    oe.oe_id = EntityId::final_id(id)?;
    debug!(id, oe = %name, "operational environment matched");

    if let Some(deps) = remote_array(remote, "dependencies")? {
        for dep in deps {
            check_dependency(oe, dep)?;
        }
    }

    let mut dependency_ids = Vec::new();
    if let Some(urls) = remote_array(remote, "dependencyUrls")? {
        for url in urls {
            let url = url.as_str().ok_or_else(|| {
                MetaError::Malformed(format!("dependency URL is {}", type_name(url)))
            })?;
            dependency_ids.push(trailing_number(url)?);
        }
    }

    Ok(OeMatch {
        outcome: MatchOutcome::Matched(id),
        dependency_ids,
    })
}

fn remote_array<'a>(remote: &'a Value, key: &str) -> Result<Option<&'a Vec<Value>>> {
    match remote.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(MetaError::Malformed(format!(
            "'{key}' is {}, expected array",
            type_name(other)
        ))),
    }
}

/// Compare one dependency linked from a remote OE against the local record.
pub fn check_dependency(oe: &mut OeRecord, dep: &Value) -> Result<()> {
    match remote_str(dep, "type")? {
        Some(TYPE_SOFTWARE) if oe.env_name.is_some() => {
            if match_software(oe, dep)? == MatchOutcome::NotFound {
                debug!("software dependency of the OE differs, registering anew");
                oe.sw_id = EntityId::Unset;
            }
        }
        Some(TYPE_PROCESSOR) if oe.has_processor() => {
            if match_processor(oe, dep)? == MatchOutcome::NotFound {
                debug!("processor dependency of the OE differs, registering anew");
                oe.proc_id = EntityId::Unset;
            }
        }
        other => debug!(kind = ?other, "dependency not tracked locally, ignored"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn oe(series: &str, name: &str) -> OeRecord {
        OeRecord {
            env_name: Some("Linux 5.4".into()),
            manufacturer: Some("Intel".into()),
            proc_family: Some("x86".into()),
            proc_series: Some(series.into()),
            proc_name: Some(name.into()),
            ..Default::default()
        }
    }

    fn endpoints() -> Endpoints {
        Endpoints::new("https://acvp.example/acvp/v1").expect("base")
    }

    #[test]
    fn name_deduplicates_processor_against_series() {
        assert_eq!(oe_name(&oe("Skylake", "Skylake")), "Linux 5.4 on Intel Skylake");
        assert_eq!(
            oe_name(&oe("Skylake", "i7-6700")),
            "Linux 5.4 on Intel Skylake i7-6700"
        );
    }

    #[test]
    fn name_without_environment_or_processor() {
        let mut bare = oe("Skylake", "i7-6700");
        bare.env_name = None;
        assert_eq!(oe_name(&bare), "Intel Skylake i7-6700");

        let env_only = OeRecord {
            env_name: Some("Linux 5.4".into()),
            ..Default::default()
        };
        assert_eq!(oe_name(&env_only), "Linux 5.4");
    }

    #[test]
    fn final_dependencies_are_referenced_by_url() {
        let mut local = oe("Skylake", "i7-6700");
        local.proc_id = EntityId::Final(12);
        let built = build_oe(&local, &endpoints());
        assert_eq!(built["dependencyUrls"], json!(["/acvp/v1/dependencies/12"]));
        let inline = built["dependencies"].as_array().expect("inline deps");
        assert_eq!(inline.len(), 1);
        assert_eq!(inline[0]["type"], "software");
    }

    #[test]
    fn stray_software_id_is_not_reported() {
        let mut local = oe("Skylake", "i7-6700");
        local.env_name = None;
        local.proc_id = EntityId::Final(12);
        local.sw_id = EntityId::Final(13);
        let built = build_oe(&local, &endpoints());
        assert_eq!(built["dependencyUrls"], json!(["/acvp/v1/dependencies/12"]));
        assert!(built.get("dependencies").is_none());
    }

    #[test]
    fn matching_oe_collects_linked_dependencies() {
        let mut local = oe("Skylake", "i7-6700");
        let remote = json!({
            "name": "Linux 5.4 on Intel Skylake i7-6700",
            "url": "/acvp/v1/oes/300",
            "dependencyUrls": ["/acvp/v1/dependencies/12", "/acvp/v1/dependencies/13"]
        });
        let found = match_oe(&mut local, &remote).expect("match");
        assert_eq!(found.outcome, MatchOutcome::Matched(300));
        assert_eq!(found.dependency_ids, vec![12, 13]);
        assert_eq!(local.oe_id, EntityId::Final(300));
    }

    #[test]
    fn differing_inline_dependency_clears_local_id_only() {
        let mut local = oe("Skylake", "i7-6700");
        local.proc_id = EntityId::Final(12);
        local.sw_id = EntityId::Final(13);
        let remote = json!({
            "name": "Linux 5.4 on Intel Skylake i7-6700",
            "url": "/acvp/v1/oes/300",
            "dependencies": [
                {"type": "processor", "manufacturer": "AMD", "family": "x86",
                 "name": "i7-6700", "series": "Skylake", "url": "/acvp/v1/dependencies/12"},
                {"type": "software", "name": "Linux 5.4", "description": "Linux 5.4",
                 "url": "/acvp/v1/dependencies/13"}
            ]
        });
        let found = match_oe(&mut local, &remote).expect("match");
        assert_eq!(found.outcome, MatchOutcome::Matched(300));
        assert!(local.proc_id.is_unset());
        assert_eq!(local.sw_id, EntityId::Final(13));
    }

    #[test]
    fn linked_processor_is_ignored_without_local_processor() {
        let mut local = OeRecord {
            env_name: Some("Linux 5.4".into()),
            ..Default::default()
        };
        let dep = json!({"type": "processor", "manufacturer": "AMD", "family": "x86",
                         "url": "/acvp/v1/dependencies/12"});
        check_dependency(&mut local, &dep).expect("check");
        assert!(local.proc_id.is_unset());
    }

    #[test]
    fn other_name_is_not_found() {
        let mut local = oe("Skylake", "i7-6700");
        let remote = json!({"name": "Windows 10 on Intel Skylake", "url": "/acvp/v1/oes/1"});
        let found = match_oe(&mut local, &remote).expect("match");
        assert_eq!(found.outcome, MatchOutcome::NotFound);
        assert!(local.oe_id.is_unset());
    }
}
