// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Asynchronous request objects.
//
// Every create/update answers with a request document instead of the record:
//   {"url": "/acvp/v1/requests/17", "status": "processing"}
//   {"url": "/acvp/v1/requests/17", "status": "approved",
//    "approvedUrl": "/acvp/v1/oes/2201"}
// The request is polled at `{base}/requests/{n}` until it is approved or
// rejected.

use serde_json::Value;
use tracing::{debug, instrument};

use metasync_core::error::{MetaError, Result};
use metasync_core::id::{EntityId, NUMERIC_MAX, RequestState};

use crate::client::ServerClient;
use crate::endpoint::{Resource, trailing_number};

/// Outcome of a submitted request as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Initial(u32),
    Processing(u32),
    Approved(u32),
    Rejected,
}

impl RequestStatus {
    /// Identifier to store locally for this status.
    pub fn to_entity_id(self) -> Result<EntityId> {
        Ok(match self {
            Self::Initial(n) => EntityId::pending(RequestState::Initial, n),
            Self::Processing(n) => EntityId::pending(RequestState::Processing, n),
            Self::Approved(id) => EntityId::final_id(id)?,
            Self::Rejected => EntityId::rejected(),
        })
    }
}

fn checked_request_number(n: u32) -> Result<u32> {
    if n > NUMERIC_MAX {
        return Err(MetaError::Malformed(format!(
            "request number {n} does not fit next to a status flag"
        )));
    }
    Ok(n)
}

/// Interpret a request document.
pub fn parse_request_status(data: &Value) -> Result<RequestStatus> {
    let status = data
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| MetaError::Malformed("request object without 'status'".into()))?;

    let request_number = || -> Result<u32> {
        let url = data
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| MetaError::Malformed("request object without 'url'".into()))?;
        checked_request_number(trailing_number(url)?)
    };

    match status {
        "initial" => Ok(RequestStatus::Initial(request_number()?)),
        "processing" => Ok(RequestStatus::Processing(request_number()?)),
        "approved" => {
            let approved = data
                .get("approvedUrl")
                .and_then(Value::as_str)
                .ok_or_else(|| MetaError::Malformed("approved request without 'approvedUrl'".into()))?;
            let id = trailing_number(approved)?;
            EntityId::final_id(id)?;
            Ok(RequestStatus::Approved(id))
        }
        "rejected" => Ok(RequestStatus::Rejected),
        other => Err(MetaError::Malformed(format!("unknown request status '{other}'"))),
    }
}

/// Identifier to store after a POST/PUT. A server that answers with the
/// record itself (carrying a `url` but no `status`) yields the final id.
pub fn parse_submission(data: &Value) -> Result<EntityId> {
    if data.get("status").is_some() {
        return parse_request_status(data).and_then(RequestStatus::to_entity_id);
    }
    match data.get("url").and_then(Value::as_str) {
        Some(url) => EntityId::final_id(trailing_number(url)?),
        None => Err(MetaError::Malformed(
            "submission answer carries neither request status nor url".into(),
        )),
    }
}

/// Poll the status of request `n`.
#[instrument(skip(client))]
pub async fn fetch_request(client: &ServerClient, request: u32) -> Result<RequestStatus> {
    let url = client.endpoints().record(Resource::Requests, request);
    let data = client.get_data(&url).await?;
    let status = parse_request_status(&data)?;
    debug!(?status, "request status");
    Ok(status)
}
