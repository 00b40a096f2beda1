// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing error messages.
//
// Every technical error is mapped to a short statement of what happened and
// what the operator should do next. The CLI prints these in its summary.

use crate::error::{ErrorClass, MetaError};

/// A readable error with an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    /// Whether running again later may succeed without any change.
    pub retriable: bool,
    pub class: ErrorClass,
}

pub fn humanize_error(err: &MetaError) -> HumanError {
    let class = err.class();
    match err {
        MetaError::InvalidArgument(detail) => HumanError {
            message: "The definition is incomplete.".into(),
            suggestion: format!("Add the missing record to the definitions file. ({detail})"),
            retriable: false,
            class,
        },

        MetaError::NotFound(detail) => HumanError {
            message: "No matching record exists on the server.".into(),
            suggestion: format!("Run without --show to register it. ({detail})"),
            retriable: false,
            class,
        },

        MetaError::Malformed(detail) => HumanError {
            message: "The server sent data we could not understand.".into(),
            suggestion: format!("Check the server URL and protocol version. ({detail})"),
            retriable: false,
            class,
        },

        MetaError::Conflict(detail) => HumanError {
            message: "Local data differs from the server and no change was approved.".into(),
            suggestion: format!(
                "Fix the local definition or re-run and accept the update. ({detail})"
            ),
            retriable: false,
            class,
        },

        MetaError::Transient(detail) => HumanError {
            message: "The server could not be reached.".into(),
            suggestion: format!("Check the network connection and try again. ({detail})"),
            retriable: true,
            class,
        },

        MetaError::Pending(detail) => HumanError {
            message: "A registration request is still waiting for approval.".into(),
            suggestion: format!("Run `metasync resolve` once the request was processed. ({detail})"),
            retriable: true,
            class,
        },

        MetaError::Http { status, detail } => humanize_http(*status, detail, class),

        MetaError::Database(detail) => HumanError {
            message: "The local identifier database could not be used.".into(),
            suggestion: format!("Check that the database file is writable. ({detail})"),
            retriable: false,
            class,
        },

        MetaError::Config(detail) => HumanError {
            message: "The configuration is invalid.".into(),
            suggestion: format!("Fix the configuration file. ({detail})"),
            retriable: false,
            class,
        },

        MetaError::Io(e) => HumanError {
            message: "A local file could not be read or written.".into(),
            suggestion: format!("Check the path and its permissions. ({e})"),
            retriable: false,
            class,
        },

        MetaError::Serialization(e) => HumanError {
            message: "A JSON document could not be processed.".into(),
            suggestion: format!("Validate the JSON file for syntax errors. ({e})"),
            retriable: false,
            class,
        },
    }
}

fn humanize_http(status: u16, detail: &str, class: ErrorClass) -> HumanError {
    match status {
        401 | 403 => HumanError {
            message: "The server refused our credentials.".into(),
            suggestion: "Renew the access token and update `server.bearer_token`.".into(),
            retriable: false,
            class,
        },
        408 | 429 | 500..=599 => HumanError {
            message: "The server is busy or failing.".into(),
            suggestion: format!("Wait a few minutes, then try again. (HTTP {status})"),
            retriable: true,
            class,
        },
        _ => HumanError {
            message: "The server rejected the request.".into(),
            suggestion: format!("Review the submitted data. (HTTP {status}: {detail})"),
            retriable: false,
            class,
        },
    }
}
