// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport seam.
//
// Everything above this trait is plain JSON over URLs; the HTTP client,
// TLS and authentication live behind it so the reconciliation logic can be
// driven by an in-process double in tests.

use async_trait::async_trait;
use metasync_core::error::Result;
use serde_json::Value;

/// HTTP verb of a server operation. `None` records that the decision policy
/// chose to leave the entity untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    None,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::None => "NONE",
        }
    }

    /// Verbs that change server state and therefore need confirmation.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Delete)
    }
}

impl std::fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw server answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes one HTTP exchange. Implementations return `Ok` for any status
/// the server answered with; only failures to get an answer are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, verb: HttpVerb, url: &str, body: Option<&Value>) -> Result<Response>;
}

/// Observer of every server exchange, e.g. a persistent journal.
pub trait ResponseLog: Send + Sync {
    fn record(&self, verb: HttpVerb, url: &str, response: &Response) -> Result<()>;
}
