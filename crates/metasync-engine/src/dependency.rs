// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Builders and matchers for OE dependencies.
//
//   {"type": "processor", "manufacturer": "Intel", "family": "x86",
//    "name": "Intel(R) Core(TM) i7-6700", "series": "Skylake",
//    "description": "Processor ... (processor family x86) from Intel"}
//
//   {"type": "software", "name": "Linux 5.4",
//    "cpe": "cpe:2.3:o:linux:linux_kernel:5.4", "swid": null,
//    "description": "Linux 5.4"}
//
// Matchers compare field by field with exact string equality. Fields the
// local record does not declare are not compared. A full match copies the
// numeric id from the remote `url` into the record.

use serde_json::{Value, json};
use tracing::{debug, trace};

use metasync_core::error::{MetaError, Result};
use metasync_core::id::EntityId;
use metasync_core::types::OeRecord;
use metasync_protocol::endpoint::trailing_number;
use metasync_protocol::envelope::type_name;

use crate::entity::MatchOutcome;

pub const TYPE_PROCESSOR: &str = "processor";
pub const TYPE_SOFTWARE: &str = "software";

/// Canonical processor dependency. `None` when the record declares no
/// processor at all.
pub fn build_processor(oe: &OeRecord) -> Option<Value> {
    if !oe.has_processor() {
        return None;
    }
    let or_empty = |s: &Option<String>| s.clone().unwrap_or_default();
    let description = format!(
        "Processor {} (processor family {}) from {}",
        or_empty(&oe.proc_name),
        or_empty(&oe.proc_family),
        or_empty(&oe.manufacturer)
    );
    // Features are kept locally only; the dependency schema rejects them.
    Some(json!({
        "type": TYPE_PROCESSOR,
        "manufacturer": oe.manufacturer,
        "family": oe.proc_family,
        "name": oe.proc_name,
        "series": oe.proc_series,
        "description": description,
    }))
}

/// Canonical software dependency. `None` when no execution environment is
/// named, which means the module runs without one.
pub fn build_software(oe: &OeRecord) -> Option<Value> {
    let name = oe.env_name.as_ref()?;
    let (cpe, swid) = match (&oe.cpe, &oe.swid) {
        (Some(cpe), _) => (Value::from(cpe.as_str()), Value::Null),
        (None, Some(swid)) => (Value::Null, Value::from(swid.as_str())),
        (None, None) => {
            debug!(env = %name, "no CPE or SWID declared");
            (Value::Null, Value::Null)
        }
    };
    let description = oe.description.as_ref().unwrap_or(name);
    Some(json!({
        "type": TYPE_SOFTWARE,
        "name": name,
        "cpe": cpe,
        "swid": swid,
        "description": description,
    }))
}

/// String field of a remote object; missing and null read as absent.
pub(crate) fn remote_str<'a>(remote: &'a Value, key: &str) -> Result<Option<&'a str>> {
    match remote.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(MetaError::Malformed(format!(
            "field '{key}' is {}, expected string",
            type_name(other)
        ))),
    }
}

/// Compare one declared field. Undeclared fields always match.
pub(crate) fn field_matches(local: Option<&str>, remote: &Value, key: &str) -> Result<bool> {
    let Some(local) = local else {
        return Ok(true);
    };
    let found = remote_str(remote, key)?;
    if found != Some(local) {
        trace!(field = key, local, remote = ?found, "field differs");
        return Ok(false);
    }
    Ok(true)
}

/// Id from the `url` of a fully matched remote object.
pub(crate) fn remote_id(remote: &Value) -> Result<u32> {
    let url = remote_str(remote, "url")?
        .ok_or_else(|| MetaError::Malformed("matched object carries no 'url'".into()))?;
    trailing_number(url)
}

pub fn match_processor(oe: &mut OeRecord, remote: &Value) -> Result<MatchOutcome> {
    let fields = [
        (oe.manufacturer.as_deref(), "manufacturer"),
        (oe.proc_family.as_deref(), "family"),
        (oe.proc_name.as_deref(), "name"),
        (oe.proc_series.as_deref(), "series"),
    ];
    for (local, key) in fields {
        if !field_matches(local, remote, key)? {
            return Ok(MatchOutcome::NotFound);
        }
    }

    let id = remote_id(remote)?;
    oe.proc_id = EntityId::final_id(id)?;
    debug!(id, "processor dependency matched");
    Ok(MatchOutcome::Matched(id))
}

pub fn match_software(oe: &mut OeRecord, remote: &Value) -> Result<MatchOutcome> {
    let Some(name) = oe.env_name.as_deref() else {
        return Ok(MatchOutcome::NotFound);
    };
    // A declared CPE takes precedence over the SWID, as in the built object.
    let swid = if oe.cpe.is_some() { None } else { oe.swid.as_deref() };
    if !field_matches(Some(name), remote, "name")?
        || !field_matches(oe.cpe.as_deref(), remote, "cpe")?
        || !field_matches(swid, remote, "swid")?
    {
        return Ok(MatchOutcome::NotFound);
    }

    // Without a local CPE/SWID the server must not carry one either.
    if oe.cpe.is_none()
        && oe.swid.is_none()
        && (remote_str(remote, "swid")?.is_some() || remote_str(remote, "cpe")?.is_some())
    {
        trace!("server carries a CPE/SWID that is not declared locally");
        return Ok(MatchOutcome::NotFound);
    }

    let description = oe.description.as_deref().unwrap_or(name);
    if !field_matches(Some(description), remote, "description")? {
        return Ok(MatchOutcome::NotFound);
    }

    let id = remote_id(remote)?;
    oe.sw_id = EntityId::final_id(id)?;
    debug!(id, "software dependency matched");
    Ok(MatchOutcome::Matched(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oe() -> OeRecord {
        OeRecord {
            env_name: Some("Linux 5.4".into()),
            manufacturer: Some("Intel".into()),
            proc_family: Some("x86".into()),
            proc_name: Some("i7-6700".into()),
            proc_series: Some("Skylake".into()),
            ..Default::default()
        }
    }

    fn with_url(mut v: Value, url: &str) -> Value {
        v["url"] = Value::from(url);
        v
    }

    #[test]
    fn processor_description_names_all_parts() {
        let dep = build_processor(&oe()).expect("processor");
        assert_eq!(dep["type"], "processor");
        assert_eq!(
            dep["description"],
            "Processor i7-6700 (processor family x86) from Intel"
        );
        assert!(dep.get("features").is_none());
    }

    #[test]
    fn no_processor_fields_means_no_dependency() {
        let bare = OeRecord {
            env_name: Some("Linux".into()),
            ..Default::default()
        };
        assert!(build_processor(&bare).is_none());
    }

    #[test]
    fn software_needs_env_name() {
        let mut local = oe();
        local.env_name = None;
        assert!(build_software(&local).is_none());
    }

    #[test]
    fn software_carries_one_of_cpe_or_swid() {
        let mut local = oe();
        local.cpe = Some("cpe:2.3:o:linux:linux_kernel:5.4".into());
        local.swid = Some("ignored".into());
        let dep = build_software(&local).expect("software");
        assert_eq!(dep["cpe"], "cpe:2.3:o:linux:linux_kernel:5.4");
        assert!(dep["swid"].is_null());

        let dep = build_software(&oe()).expect("software");
        assert!(dep["cpe"].is_null());
        assert!(dep["swid"].is_null());
        assert_eq!(dep["description"], "Linux 5.4");
    }

    #[test]
    fn built_object_matches_itself() {
        let mut local = oe();
        let remote = with_url(build_software(&local).expect("software"), "/acvp/v1/dependencies/1234");
        assert_eq!(
            match_software(&mut local, &remote).expect("match"),
            MatchOutcome::Matched(1234)
        );
        assert_eq!(local.sw_id, EntityId::Final(1234));

        let remote = with_url(build_processor(&local).expect("processor"), "/acvp/v1/dependencies/77");
        assert_eq!(
            match_processor(&mut local, &remote).expect("match"),
            MatchOutcome::Matched(77)
        );
        assert_eq!(local.proc_id, EntityId::Final(77));
    }

    #[test]
    fn matched_id_in_status_bits_is_malformed() {
        let mut local = oe();
        let url = format!("/acvp/v1/dependencies/{}", 1u32 << 28);
        let remote = with_url(build_processor(&local).expect("processor"), &url);
        assert!(matches!(
            match_processor(&mut local, &remote),
            Err(MetaError::Malformed(_))
        ));
        assert_eq!(local.proc_id, EntityId::Unset);
    }

    #[test]
    fn name_mismatch_is_not_found_and_keeps_id() {
        let mut local = oe();
        local.sw_id = EntityId::Final(9);
        let remote = json!({
            "type": "software",
            "name": "Linux 6.1",
            "description": "Linux 5.4",
            "url": "/acvp/v1/dependencies/1234"
        });
        assert_eq!(
            match_software(&mut local, &remote).expect("match"),
            MatchOutcome::NotFound
        );
        assert_eq!(local.sw_id, EntityId::Final(9));
    }

    #[test]
    fn undeclared_swid_on_server_is_a_mismatch() {
        let mut local = oe();
        let remote = json!({
            "type": "software",
            "name": "Linux 5.4",
            "swid": "swid-123",
            "description": "Linux 5.4",
            "url": "/acvp/v1/dependencies/5"
        });
        assert_eq!(
            match_software(&mut local, &remote).expect("match"),
            MatchOutcome::NotFound
        );
        assert!(local.sw_id.is_unset());
    }

    #[test]
    fn undeclared_processor_fields_are_skipped() {
        let mut local = oe();
        local.proc_series = None;
        let remote = json!({
            "type": "processor",
            "manufacturer": "Intel",
            "family": "x86",
            "name": "i7-6700",
            "series": "Anything",
            "url": "/acvp/v1/dependencies/3"
        });
        assert_eq!(
            match_processor(&mut local, &remote).expect("match"),
            MatchOutcome::Matched(3)
        );
    }

    #[test]
    fn missing_remote_field_is_a_mismatch() {
        let mut local = oe();
        let remote = json!({"type": "processor", "manufacturer": "Intel", "url": "/x/1"});
        assert_eq!(
            match_processor(&mut local, &remote).expect("match"),
            MatchOutcome::NotFound
        );
    }

    #[test]
    fn wrongly_typed_field_is_malformed() {
        let mut local = oe();
        let remote = json!({"type": "processor", "manufacturer": 7});
        assert!(matches!(
            match_processor(&mut local, &remote),
            Err(MetaError::Malformed(_))
        ));
    }

    #[test]
    fn full_match_without_url_is_malformed() {
        let mut local = oe();
        let remote = build_processor(&local).expect("processor");
        assert!(matches!(
            match_processor(&mut local, &remote),
            Err(MetaError::Malformed(_))
        ));
    }
}
