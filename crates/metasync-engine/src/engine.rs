// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reconciliation engine.
//
// Per entity kind the engine either validates a known id (fetch + match) or
// searches for an equivalent record (paged search + match), and then decides
// whether to register, update, delete or leave the server untouched:
//
//   not found, no local id      -> POST (after confirmation)
//   not found, local id (drift) -> PUT, else DELETE, else Conflict
//   delete policy for the scope -> DELETE (after confirmation)
//   update policy for the scope -> PUT (after confirmation)
//   matched                     -> nothing
//
// Dry-run only prints what would be registered; show mode only searches.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use metasync_core::config::{Scope, SyncOptions};
use metasync_core::error::{MetaError, Result};
use metasync_core::id::EntityId;
use metasync_core::types::{IdRecord, OeRecord};
use metasync_protocol::client::ServerClient;
use metasync_protocol::paging::{Flow, PageVisitor, paging_get};
use metasync_protocol::request::parse_submission;
use metasync_protocol::transport::HttpVerb;
use metasync_store::ids::IdStore;

use crate::entity::{EntityKind, MatchOutcome};
use crate::policy::{Decision, DecisionPolicy, Question};

/// Dependencies an OE is built from, in registration order.
pub const DEPENDENCY_KINDS: [EntityKind; 2] = [EntityKind::Processor, EntityKind::Software];

/// Drives the reconciliation of OE records against the server.
pub struct Reconciler {
    pub(crate) client: ServerClient,
    pub(crate) policy: Arc<dyn DecisionPolicy>,
    pub(crate) options: SyncOptions,
    pub(crate) store: Arc<dyn IdStore>,
}

impl Reconciler {
    pub fn new(
        client: ServerClient,
        policy: Arc<dyn DecisionPolicy>,
        options: SyncOptions,
        store: Arc<dyn IdStore>,
    ) -> Self {
        Self {
            client,
            policy,
            options,
            store,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn client(&self) -> &ServerClient {
        &self.client
    }

    /// Fetch the record at the known id of `kind` and match it. A record the
    /// server no longer has reads as `NotFound`. The server data is returned
    /// alongside for drift reporting.
    #[instrument(skip(self, oe, kind), fields(kind = kind.label()))]
    pub async fn validate_one(
        &self,
        kind: EntityKind,
        oe: &mut OeRecord,
    ) -> Result<(MatchOutcome, Option<Value>)> {
        let id = oe.id(kind.id_field()).server_id().ok_or_else(|| {
            MetaError::InvalidArgument(format!("{} has no server id to validate", kind.label()))
        })?;
        let url = self.client.endpoints().record(kind.resource(), id);

        let remote = match self.client.get_record(&url).await {
            Ok(remote) => remote,
            Err(MetaError::NotFound(detail)) => {
                info!(id, %detail, "record no longer present on the server");
                return Ok((MatchOutcome::NotFound, None));
            }
            Err(e) => return Err(e),
        };

        let outcome = kind.match_remote(&self.client, oe, &remote).await?;
        debug!(id, ?outcome, "validated known id");
        Ok((outcome, Some(remote)))
    }

    /// Search the server for a record equivalent to the local one, stopping
    /// at the first match.
    #[instrument(skip(self, oe, kind), fields(kind = kind.label()))]
    pub async fn validate_all(&self, kind: EntityKind, oe: &mut OeRecord) -> Result<MatchOutcome> {
        let Some(url) = kind.search_url(oe, self.client.endpoints()) else {
            debug!("nothing to search for");
            return Ok(MatchOutcome::NotFound);
        };

        let mut matcher = SearchMatcher {
            kind,
            client: &self.client,
            oe,
            outcome: MatchOutcome::NotFound,
        };
        paging_get(&self.client, &url, &mut matcher).await?;
        let outcome = matcher.outcome;

        match outcome {
            MatchOutcome::Matched(id) => info!(id, "{} found on server", kind.label()),
            MatchOutcome::NotFound => info!("no matching {} on server", kind.label()),
        }
        Ok(outcome)
    }

    /// Reconcile an entity whose server id is known.
    #[instrument(skip(self, oe, kind), fields(kind = kind.label()))]
    pub async fn reconcile_known(&self, kind: EntityKind, oe: &mut OeRecord) -> Result<()> {
        let (outcome, remote) = self.validate_one(kind, oe).await?;
        if self.options.show_db_entries {
            if outcome == MatchOutcome::NotFound {
                info!("local data differs from the server entry");
            }
            return Ok(());
        }

        if self.options.deletes(Scope::Oe) {
            if remote.is_none() {
                oe.set_id(kind.id_field(), EntityId::Unset);
                return Ok(());
            }
            self.confirm(kind, Question::Delete)?;
            return self.register(kind, oe, HttpVerb::Delete, true).await;
        }

        match outcome {
            MatchOutcome::NotFound => {
                if let Some(local) = kind.build(oe, self.client.endpoints()) {
                    info!("local data:\n{}", pretty(&local));
                }
                if let Some(remote) = &remote {
                    info!("server data:\n{}", pretty(remote));
                }

                let subject = kind.label();
                if self.policy.decide(subject, Question::Update) == Decision::Proceed {
                    self.register(kind, oe, HttpVerb::Put, true).await?;
                    self.processor_guidance(kind);
                    Ok(())
                } else if self.policy.decide(subject, Question::Delete) == Decision::Proceed {
                    self.register(kind, oe, HttpVerb::Delete, true).await
                } else {
                    Err(MetaError::Conflict(format!(
                        "{subject}: registering operation interrupted"
                    )))
                }
            }
            MatchOutcome::Matched(_) if self.options.updates(Scope::Oe) => {
                self.confirm(kind, Question::Update)?;
                self.register(kind, oe, HttpVerb::Put, true).await?;
                self.processor_guidance(kind);
                Ok(())
            }
            MatchOutcome::Matched(id) => {
                debug!(id, "server entry is current");
                Ok(())
            }
        }
    }

    /// Search every dependency without an id, then register the ones still
    /// missing. Show mode stops after the search.
    #[instrument(skip_all)]
    pub async fn validate_all_dependencies(&self, oe: &mut OeRecord) -> Result<()> {
        for kind in DEPENDENCY_KINDS {
            if kind.applies_to(oe) && oe.id(kind.id_field()).is_unset() {
                self.validate_all(kind, oe).await?;
            }
        }

        if self.options.show_db_entries {
            return Ok(());
        }

        for kind in DEPENDENCY_KINDS {
            if kind.applies_to(oe) && oe.id(kind.id_field()).is_unset() {
                self.register(kind, oe, HttpVerb::Post, false).await?;
            }
        }
        Ok(())
    }

    /// Search for the OE itself and register it when the server has none.
    #[instrument(skip_all)]
    pub async fn validate_all_oe(&self, oe: &mut OeRecord) -> Result<()> {
        let outcome = self.validate_all(EntityKind::Environment, oe).await?;
        if matches!(outcome, MatchOutcome::Matched(_)) || self.options.show_db_entries {
            return Ok(());
        }
        self.register(EntityKind::Environment, oe, HttpVerb::Post, false)
            .await
    }

    /// Build and submit one entity. `confirmed` is set when the operator was
    /// already asked about this very submission.
    #[instrument(skip(self, oe, kind, verb), fields(kind = kind.label(), verb = %verb))]
    pub async fn register(
        &self,
        kind: EntityKind,
        oe: &mut OeRecord,
        verb: HttpVerb,
        confirmed: bool,
    ) -> Result<()> {
        let endpoints = self.client.endpoints();
        let field = kind.id_field();

        let payload = if verb == HttpVerb::Delete {
            None
        } else {
            match kind.build(oe, endpoints) {
                Some(payload) => Some(payload),
                None => {
                    debug!("entity does not apply, nothing to register");
                    return Ok(());
                }
            }
        };

        if self.options.dry_run {
            match &payload {
                Some(payload) => info!("Data to be registered:\n{}", pretty(payload)),
                None => info!(id = %oe.id(field), "would be deleted"),
            }
            return Ok(());
        }
        if self.options.show_db_entries {
            return Ok(());
        }

        if !confirmed {
            if let Some(payload) = &payload {
                info!("Data to be registered:\n{}", pretty(payload));
            }
            self.confirm(kind, question_for(verb))?;
        }

        let url = match verb {
            HttpVerb::Post => endpoints.collection(kind.resource()),
            HttpVerb::Put | HttpVerb::Delete => {
                let id = oe.id(field).server_id().ok_or_else(|| {
                    MetaError::InvalidArgument(format!(
                        "{verb} of {} requires a server id",
                        kind.label()
                    ))
                })?;
                endpoints.record(kind.resource(), id)
            }
            HttpVerb::Get | HttpVerb::None => {
                return Err(MetaError::InvalidArgument(format!(
                    "{verb} is not a registration"
                )));
            }
        };

        let answer = self.client.submit(verb, &url, payload).await?;
        let id = if verb == HttpVerb::Delete {
            EntityId::Unset
        } else {
            parse_submission(&answer)?
        };
        oe.set_id(field, id);
        info!(%id, "{} submitted", kind.label());
        Ok(())
    }

    fn confirm(&self, kind: EntityKind, question: Question) -> Result<()> {
        match self.policy.decide(kind.label(), question) {
            Decision::Proceed => Ok(()),
            Decision::Abort => Err(MetaError::Conflict(format!(
                "{}: operation declined",
                kind.label()
            ))),
        }
    }

    fn processor_guidance(&self, kind: EntityKind) {
        if kind == EntityKind::Processor {
            warn!(
                "processor dependency updated: repeat the operation for the OE after the \
                 processor update was approved to update the name"
            );
        }
    }
}

fn question_for(verb: HttpVerb) -> Question {
    match verb {
        HttpVerb::Put => Question::Update,
        HttpVerb::Delete => Question::Delete,
        _ => Question::Register,
    }
}

pub(crate) fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Paging visitor running the matcher of one kind over search results.
struct SearchMatcher<'a> {
    kind: EntityKind,
    client: &'a ServerClient,
    oe: &'a mut OeRecord,
    outcome: MatchOutcome,
}

#[async_trait]
impl<'a> PageVisitor for SearchMatcher<'a> {
    async fn visit(&mut self, item: &Value) -> Result<Flow> {
        match self.kind.match_remote(self.client, self.oe, item).await? {
            MatchOutcome::Matched(id) => {
                self.outcome = MatchOutcome::Matched(id);
                Ok(Flow::Stop)
            }
            MatchOutcome::NotFound => Ok(Flow::Continue),
        }
    }
}
