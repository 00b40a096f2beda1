// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metasync protocol: everything needed to talk to the validation server:
// URL construction, versioned JSON envelopes, the transport seam and its
// `reqwest` implementation, retry/backoff, paged search, and request-status
// polling.

pub mod client;
pub mod endpoint;
pub mod envelope;
pub mod http_client;
pub mod paging;
pub mod request;
pub mod retry;
pub mod transport;

pub use client::ServerClient;
pub use endpoint::{Endpoints, Resource, trailing_number};
pub use paging::{Flow, PageVisitor, paging_get};
pub use request::{RequestStatus, fetch_request, parse_submission};
pub use retry::RetryConfig;
pub use transport::{HttpVerb, Response, ResponseLog, Transport};
