// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Versioned JSON envelope.
//
// Outbound:  [ {"acvVersion": "1.0"}, { ...payload... } ]
// Inbound:   the same two-element array in either order, or a bare object
//            (usually an error body) that is passed through untouched.

use metasync_core::error::{MetaError, Result};
use serde_json::{Value, json};

/// Protocol version implemented by this client.
pub const ACV_VERSION: &str = "1.0";

/// Field that marks the version element of an envelope.
pub const VERSION_KEY: &str = "acvVersion";

/// Wrap a payload for submission.
pub fn wrap(data: Value) -> Value {
    json!([{ VERSION_KEY: ACV_VERSION }, data])
}

/// Parse a response body and split off the version element.
///
/// Returns `(full, data)`: the whole parsed document and the data object.
/// For a bare object both are the same document.
pub fn strip_version(raw: &[u8]) -> Result<(Value, Value)> {
    let full: Value = serde_json::from_slice(raw)
        .map_err(|e| MetaError::Malformed(format!("response is not JSON: {e}")))?;

    let data = match &full {
        Value::Object(_) => full.clone(),
        Value::Array(items) => split_array(items)?,
        other => {
            return Err(MetaError::Malformed(format!(
                "unexpected response type: {}",
                type_name(other)
            )));
        }
    };
    Ok((full, data))
}

fn split_array(items: &[Value]) -> Result<Value> {
    if items.len() != 2 {
        return Err(MetaError::Malformed(format!(
            "envelope has {} elements, expected 2",
            items.len()
        )));
    }

    let mut version = None;
    let mut data = None;
    for item in items {
        let Value::Object(obj) = item else {
            return Err(MetaError::Malformed(format!(
                "envelope element is {}, expected object",
                type_name(item)
            )));
        };
        let slot = if obj.contains_key(VERSION_KEY) {
            &mut version
        } else {
            &mut data
        };
        if slot.replace(item).is_some() {
            return Err(MetaError::Malformed(
                "envelope must hold one version and one data element".into(),
            ));
        }
    }

    match (version, data) {
        (Some(_), Some(data)) => Ok(data.clone()),
        (None, _) => Err(MetaError::Malformed("envelope carries no version element".into())),
        (Some(_), None) => Err(MetaError::Malformed("envelope carries no data element".into())),
    }
}

pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
