// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decision policy seam.
//
// Before any mutating submission the engine asks its policy. The console
// prompt and the non-interactive auto-approval are two implementations of
// the same trait, so the engine itself runs headless in tests.

use std::fmt;

/// A question put to the operator before a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Question {
    /// No equivalent record on the server: register it?
    Register,
    /// Local data differs from the server record: update the server?
    Update,
    /// Remove the record from the server?
    Delete,
}

impl Question {
    /// Answer the console uses when the operator just presses enter.
    pub fn default_decision(&self) -> Decision {
        match self {
            Self::Register | Self::Update => Decision::Proceed,
            Self::Delete => Decision::Abort,
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Register => "No matching entry found - shall it be REGISTERED with the server",
            Self::Update => "Local meta data differs from server data - shall the server be UPDATED",
            Self::Delete => "Shall the entry be DELETED from the server",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Abort,
}

/// Answers questions about a pending mutation of `subject`. Payloads have
/// already been logged by the engine when this is called.
pub trait DecisionPolicy: Send + Sync {
    fn decide(&self, subject: &str, question: Question) -> Decision;
}

/// Non-interactive policy: proceed with everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl DecisionPolicy for AutoApprove {
    fn decide(&self, subject: &str, question: Question) -> Decision {
        tracing::info!(subject, ?question, "proceeding without confirmation");
        Decision::Proceed
    }
}

/// Policy that declines everything; used for show-only runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl DecisionPolicy for DenyAll {
    fn decide(&self, subject: &str, question: Question) -> Decision {
        tracing::info!(subject, ?question, "declined by policy");
        Decision::Abort
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_defaults_to_no() {
        assert_eq!(Question::Delete.default_decision(), Decision::Abort);
        assert_eq!(Question::Update.default_decision(), Decision::Proceed);
    }

    #[test]
    fn fixed_policies() {
        assert_eq!(AutoApprove.decide("oe", Question::Delete), Decision::Proceed);
        assert_eq!(DenyAll.decide("oe", Question::Register), Decision::Abort);
    }
}
