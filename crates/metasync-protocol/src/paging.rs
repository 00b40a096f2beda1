// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paged search.
//
// A search answer looks like
//   {"totalCount": 42, "incomplete": true,
//    "links": {"next": "/acvp/v1/oes?offset=20&..."}, "data": [ ... ]}
// Pages are fetched one after the other and every element of `data` is
// handed to the visitor until it asks to stop or the pages run out.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use metasync_core::error::{MetaError, Result};

use crate::client::ServerClient;
use crate::envelope::type_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Per-item callback of a paged search.
#[async_trait]
pub trait PageVisitor: Send {
    async fn visit(&mut self, item: &Value) -> Result<Flow>;
}

/// Walk all pages starting at `url`. Returns `Flow::Stop` if the visitor
/// stopped early, `Flow::Continue` if every page was exhausted.
#[instrument(skip(client, visitor))]
pub async fn paging_get(
    client: &ServerClient,
    url: &str,
    visitor: &mut dyn PageVisitor,
) -> Result<Flow> {
    let mut next = Some(url.to_string());
    let mut page = 0u32;

    while let Some(current) = next.take() {
        let data = client.get_data(&current).await?;
        page += 1;

        let items = match data.get("data") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(other) => {
                return Err(MetaError::Malformed(format!(
                    "search page 'data' is {}, expected array",
                    type_name(other)
                )));
            }
            None => &[],
        };
        debug!(page, items = items.len(), "search page received");

        for item in items {
            if visitor.visit(item).await? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }

        let incomplete = data.get("incomplete").and_then(Value::as_bool).unwrap_or(false);
        if incomplete {
            if let Some(link) = data.pointer("/links/next").and_then(Value::as_str) {
                next = Some(client.endpoints().resolve_link(link)?);
            }
        }
    }

    Ok(Flow::Continue)
}
