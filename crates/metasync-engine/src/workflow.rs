// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Top-level record workflows.
//
// Each workflow holds the record's lock for its whole run, loads persisted
// ids first and saves them on every exit path, so partial progress (e.g. a
// processor registered before the software submission failed) survives.

use tracing::{info, instrument, warn};

use metasync_core::config::Scope;
use metasync_core::error::{MetaError, Result};
use metasync_core::lock;
use metasync_core::registry::Definition;
use metasync_core::types::{IdRecord, OeRecord};
use metasync_protocol::transport::HttpVerb;
use metasync_store::ids::{IdStore, load_into, save_from};

use crate::engine::{DEPENDENCY_KINDS, Reconciler};
use crate::entity::{EntityKind, MatchOutcome};
use crate::resolver::resolve_record;

impl Reconciler {
    /// Reconcile the OE of `def` and its dependencies with the server.
    #[instrument(skip_all, fields(definition = %def.label()))]
    pub async fn handle_oe(&self, def: &Definition) -> Result<()> {
        let mut oe = lock::acquire(def.oe.as_deref(), "oe").await?;
        load_into(self.store.as_ref(), &mut *oe)?;

        let outcome = self.reconcile_oe(&mut oe).await;
        persist(self.store.as_ref(), &*oe, outcome)
    }

    /// Resolve pending ids of every record of `def` without touching
    /// anything else.
    #[instrument(skip_all, fields(definition = %def.label()))]
    pub async fn handle_open_requests(&self, def: &Definition) -> Result<()> {
        if def.oe.is_none() && def.vendor.is_none() && def.module.is_none() {
            return Err(MetaError::InvalidArgument(
                "definition carries no record with server ids".into(),
            ));
        }

        let mut still_open = Vec::new();
        if let Some(record) = def.oe.as_deref() {
            let mut guard = record.acquire().await;
            collect_pending(self.resolve_persisted(&mut *guard).await, &mut still_open)?;
        }
        if let Some(record) = def.vendor.as_deref() {
            let mut guard = record.acquire().await;
            collect_pending(self.resolve_persisted(&mut *guard).await, &mut still_open)?;
        }
        if let Some(record) = def.module.as_deref() {
            let mut guard = record.acquire().await;
            collect_pending(self.resolve_persisted(&mut *guard).await, &mut still_open)?;
        }

        if still_open.is_empty() {
            Ok(())
        } else {
            Err(MetaError::Pending(still_open.join("; ")))
        }
    }

    async fn resolve_persisted<R: IdRecord + Send>(&self, record: &mut R) -> Result<()> {
        load_into(self.store.as_ref(), record)?;
        let outcome = resolve_record(&self.client, record).await;
        persist(self.store.as_ref(), record, outcome)
    }

    /// Body of the OE workflow. Runs with the record locked.
    pub async fn reconcile_oe(&self, oe: &mut OeRecord) -> Result<()> {
        if self.options.dry_run {
            for kind in [EntityKind::Processor, EntityKind::Software, EntityKind::Environment] {
                self.register(kind, oe, HttpVerb::Post, true).await?;
            }
            return Ok(());
        }

        resolve_record(&self.client, oe).await?;

        if self.options.deletes(Scope::Oe) && !self.options.show_db_entries {
            return self.delete_oe(oe).await;
        }

        if oe.proc_id.is_valid() {
            self.reconcile_known(EntityKind::Processor, oe).await?;
        }

        if oe.sw_id.is_valid() {
            if oe.env_name.is_some() {
                self.reconcile_known(EntityKind::Software, oe).await?;
            } else {
                warn!(
                    sw_id = %oe.sw_id,
                    "software dependency id configured without an execution environment name, ignored"
                );
            }
        }

        if oe.oe_id.is_valid() && !self.options.show_db_entries {
            if dependencies_missing(oe) {
                self.validate_all_dependencies(oe).await?;
            }
            self.dependencies_settled(oe)?;
            self.reconcile_known(EntityKind::Environment, oe).await?;

            // A dependency of the server OE that differs locally was cleared
            // by the match and needs registering.
            if dependencies_missing(oe) {
                self.validate_all_dependencies(oe).await?;
                warn!(
                    oe_id = %oe.oe_id,
                    "dependencies of the OE changed; re-run with an OE update once they are approved"
                );
            }
            return Ok(());
        }

        if self.options.show_db_entries || dependencies_missing(oe) {
            self.validate_all_dependencies(oe).await?;
        }
        if !self.options.show_db_entries {
            self.dependencies_settled(oe)?;
        }
        self.validate_all_oe(oe).await
    }

    /// Explicit delete: the OE goes first since the server refuses to drop
    /// dependencies still referenced.
    async fn delete_oe(&self, oe: &mut OeRecord) -> Result<()> {
        for kind in [EntityKind::Environment, EntityKind::Processor, EntityKind::Software] {
            if !kind.applies_to(oe) {
                continue;
            }
            if oe.id(kind.id_field()).is_valid() {
                self.reconcile_known(kind, oe).await?;
            } else if let MatchOutcome::Matched(id) = self.validate_all(kind, oe).await? {
                info!(id, "deleting {} found by search", kind.label());
                self.register(kind, oe, HttpVerb::Delete, false).await?;
            }
        }
        Ok(())
    }

    /// The OE can only reference dependencies the server has approved.
    fn dependencies_settled(&self, oe: &OeRecord) -> Result<()> {
        let waiting: Vec<String> = DEPENDENCY_KINDS
            .iter()
            .filter(|kind| kind.applies_to(oe) && oe.id(kind.id_field()).is_pending())
            .map(|kind| format!("{}: {}", kind.label(), oe.id(kind.id_field())))
            .collect();
        if waiting.is_empty() {
            Ok(())
        } else {
            Err(MetaError::Pending(format!(
                "awaiting approval of {}; re-run to register the OE",
                waiting.join(", ")
            )))
        }
    }
}

fn dependencies_missing(oe: &OeRecord) -> bool {
    DEPENDENCY_KINDS
        .iter()
        .any(|kind| kind.applies_to(oe) && oe.id(kind.id_field()).is_unset())
}

/// Save ids whatever the workflow outcome; the workflow error wins.
fn persist<R: IdRecord + ?Sized>(
    store: &dyn IdStore,
    record: &R,
    outcome: Result<()>,
) -> Result<()> {
    let saved = save_from(store, record);
    match (outcome, saved) {
        (Err(e), Err(save)) => {
            warn!(error = %save, record = %record.record_key(), "could not persist ids");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), saved) => saved,
    }
}

fn collect_pending(outcome: Result<()>, open: &mut Vec<String>) -> Result<()> {
    match outcome {
        Err(MetaError::Pending(detail)) => {
            open.push(detail);
            Ok(())
        }
        other => other,
    }
}
