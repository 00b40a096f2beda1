// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Metasync.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Metasync operations.
#[derive(Debug, Error)]
pub enum MetaError {
    // -- Reconciliation outcomes --
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No equivalent remote record exists. A negative result, not a failure.
    #[error("no matching record on the server: {0}")]
    NotFound(String),

    #[error("malformed server data: {0}")]
    Malformed(String),

    /// Local data diverges from the server and every offered resolution was
    /// declined.
    #[error("local data conflicts with server data: {0}")]
    Conflict(String),

    #[error("transient network or server failure: {0}")]
    Transient(String),

    /// An identifier is still awaiting approval on the server side.
    #[error("request pending on the server: {0}")]
    Pending(String),

    #[error("server refused the request (HTTP {status}): {detail}")]
    Http { status: u16, detail: String },

    // -- Storage / configuration --
    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MetaError {
    /// Expected control-flow outcomes that callers handle locally rather than
    /// report as failures.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Pending(_))
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transient(_) => ErrorClass::Transient,
            Self::Http { status, .. } if *status == 408 || *status == 429 || *status >= 500 => {
                ErrorClass::Transient
            }
            Self::Pending(_) | Self::Conflict(_) | Self::Config(_) | Self::InvalidArgument(_) => {
                ErrorClass::UserAction
            }
            Self::Http { status, .. } if *status == 401 || *status == 403 => {
                ErrorClass::UserAction
            }
            _ => ErrorClass::Permanent,
        }
    }
}

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network blip, timeout, overloaded server; safe to retry automatically.
    Transient,
    /// The operator must act (approve a request, fix the configuration).
    UserAction,
    /// Permanent failure: malformed data, refused request.
    Permanent,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MetaError>;
