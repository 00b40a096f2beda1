// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Entity kinds handled by the reconciliation engine and their build/match
// dispatch.

use serde_json::Value;
use tracing::debug;

use metasync_core::error::Result;
use metasync_core::types::{IdField, OeRecord};
use metasync_protocol::client::ServerClient;
use metasync_protocol::endpoint::{Endpoints, Resource};

use crate::{dependency, environment};

/// Result of comparing one remote object against the local record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Equivalent; carries the remote id now stored locally.
    Matched(u32),
    NotFound,
}

/// The three entities an OE record is registered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Processor,
    Software,
    Environment,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Processor => "processor dependency",
            Self::Software => "software dependency",
            Self::Environment => "operational environment",
        }
    }

    pub fn id_field(&self) -> IdField {
        match self {
            Self::Processor => IdField::ProcessorDependency,
            Self::Software => IdField::SoftwareDependency,
            Self::Environment => IdField::Oe,
        }
    }

    pub fn resource(&self) -> Resource {
        match self {
            Self::Processor | Self::Software => Resource::Dependencies,
            Self::Environment => Resource::Oes,
        }
    }

    /// Whether the record declares this entity at all.
    pub fn applies_to(&self, oe: &OeRecord) -> bool {
        match self {
            Self::Processor => oe.has_processor(),
            Self::Software => oe.env_name.is_some(),
            Self::Environment => true,
        }
    }

    /// Canonical JSON of the entity, `None` when it does not apply.
    pub fn build(&self, oe: &OeRecord, endpoints: &Endpoints) -> Option<Value> {
        match self {
            Self::Processor => dependency::build_processor(oe),
            Self::Software => dependency::build_software(oe),
            Self::Environment => Some(environment::build_oe(oe, endpoints)),
        }
    }

    /// Name-contains search for candidates of this entity.
    pub fn search_url(&self, oe: &OeRecord, endpoints: &Endpoints) -> Option<String> {
        let term = match self {
            Self::Processor => oe
                .proc_name
                .clone()
                .or_else(|| oe.proc_series.clone())
                .or_else(|| oe.manufacturer.clone()),
            Self::Software => oe.env_name.clone(),
            Self::Environment => Some(environment::oe_name(oe)),
        }?;
        Some(endpoints.search(self.resource(), &term))
    }

    /// Compare `remote` against the record, storing the remote id on a match.
    /// For an OE, dependencies linked by URL are fetched and checked as well.
    pub async fn match_remote(
        &self,
        client: &ServerClient,
        oe: &mut OeRecord,
        remote: &Value,
    ) -> Result<MatchOutcome> {
        match self {
            // A dependency search returns both kinds; only ours can match.
            Self::Processor => match dependency::remote_str(remote, "type")? {
                Some(dependency::TYPE_PROCESSOR) => dependency::match_processor(oe, remote),
                _ => Ok(MatchOutcome::NotFound),
            },
            Self::Software => match dependency::remote_str(remote, "type")? {
                Some(dependency::TYPE_SOFTWARE) => dependency::match_software(oe, remote),
                _ => Ok(MatchOutcome::NotFound),
            },
            Self::Environment => {
                let found = environment::match_oe(oe, remote)?;
                for id in found.dependency_ids {
                    let url = client.endpoints().record(Resource::Dependencies, id);
                    debug!(id, "checking linked dependency");
                    let dep = client.get_data(&url).await?;
                    environment::check_dependency(oe, &dep)?;
                }
                Ok(found.outcome)
            }
        }
    }
}
