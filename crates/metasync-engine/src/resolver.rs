// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pending-request resolver.
//
// Identifiers returned by a create/update are request numbers until the
// server approves them. Before any other step touches a record, each pending
// slot is polled:
//   still initial/processing  -> unchanged, record skipped this run
//   approved                  -> replaced by the final id
//   rejected                  -> replaced by the rejected marker, skipped
// A rejected marker found at the start of a run was already reported and is
// cleared, so the entity is searched for and registered again.

use tracing::{info, instrument, warn};

use metasync_core::error::{MetaError, Result};
use metasync_core::id::{EntityId, RequestState};
use metasync_core::types::IdRecord;
use metasync_protocol::client::ServerClient;
use metasync_protocol::request::{RequestStatus, fetch_request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing was pending.
    Unchanged,
    StillPending,
    Approved(u32),
    Rejected,
    /// A rejected marker from an earlier run was reset.
    Cleared,
}

/// Resolve one identifier in place.
pub async fn resolve_id(client: &ServerClient, id: &mut EntityId) -> Result<Resolution> {
    let (state, request) = match *id {
        EntityId::Unset | EntityId::Final(_) => return Ok(Resolution::Unchanged),
        EntityId::Pending {
            state: RequestState::Rejected,
            ..
        } => {
            *id = EntityId::Unset;
            return Ok(Resolution::Cleared);
        }
        EntityId::Pending { state, request } => (state, request),
    };

    let status = fetch_request(client, request).await?;
    *id = status.to_entity_id()?;
    Ok(match status {
        RequestStatus::Initial(_) | RequestStatus::Processing(_) => {
            info!(request, was = ?state, "request not yet processed by the server");
            Resolution::StillPending
        }
        RequestStatus::Approved(final_id) => {
            info!(request, id = final_id, "request approved");
            Resolution::Approved(final_id)
        }
        RequestStatus::Rejected => {
            warn!(request, "request rejected by the server");
            Resolution::Rejected
        }
    })
}

/// Resolve every slot of a record. Fails with `Pending` when any slot is
/// still waiting or was just rejected; the record is updated either way.
#[instrument(skip_all, fields(record = %record.record_key()))]
pub async fn resolve_record<R: IdRecord + ?Sized>(
    client: &ServerClient,
    record: &mut R,
) -> Result<()> {
    let mut open = Vec::new();
    for (field, mut id) in record.id_fields() {
        let resolution = resolve_id(client, &mut id).await?;
        if resolution != Resolution::Unchanged {
            record.set_id(field, id);
        }
        match resolution {
            Resolution::StillPending => open.push(format!("{field}: {id}")),
            Resolution::Rejected => open.push(format!("{field}: rejected")),
            Resolution::Cleared => info!(%field, "earlier rejection cleared, will register again"),
            Resolution::Unchanged | Resolution::Approved(_) => {}
        }
    }

    if open.is_empty() {
        Ok(())
    } else {
        Err(MetaError::Pending(open.join(", ")))
    }
}
