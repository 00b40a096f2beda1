// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metasync engine: builds and matches OE and dependency records, asks the
// decision policy before mutations, resolves pending requests, and runs the
// per-record workflows.

pub mod dependency;
pub mod engine;
pub mod entity;
pub mod environment;
pub mod policy;
pub mod resolver;
pub mod workflow;

pub use engine::Reconciler;
pub use entity::{EntityKind, MatchOutcome};
pub use environment::oe_name;
pub use policy::{AutoApprove, Decision, DecisionPolicy, DenyAll, Question};
pub use resolver::{Resolution, resolve_id, resolve_record};
