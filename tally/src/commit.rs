//! Saving the change set.
//!
//! A commit runs in three steps so edits can keep flowing while calls are in flight:
//! `begin` freezes a snapshot and plans it, `PreparedCommit::execute` talks to the store
//! without touching the change set, and `finish` settles the results back in.

use crate::changes::{ChangeSet, ChangeSetSnapshot, Field, FieldValue, PendingValue};
use crate::error::{LedgerError, StoreError};
use crate::identity::{PendingId, RowKey};
use crate::planner::{
    PlannedCreate, PlannedDelete, PlannedUpdate, ReconciliationPlan, ReconciliationPlanner,
    Scope, SortListing,
};
use crate::store::{Identity, RowStore};
use std::collections::{HashMap, HashSet};
use tally_api::endpoints::{RowId, RowPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitState {
    #[default]
    Idle,
    Committing,
    /// Last commit left rows unsaved; committing again retries them
    Failed,
}

#[derive(Debug, Default)]
pub struct CommitCoordinator {
    state: CommitState,
    generation: u64,
}

/// A planned commit, ready to send
#[derive(Debug)]
pub struct PreparedCommit {
    generation: u64,
    snapshot: ChangeSetSnapshot,
    plan: ReconciliationPlan,
    blocked: Vec<LedgerError>,
}

/// Per-call results of an executed commit, waiting to be settled
#[derive(Debug)]
pub struct CommitOutcome {
    generation: u64,
    snapshot: ChangeSetSnapshot,
    blocked: Vec<LedgerError>,
    deleted: Vec<(PlannedDelete, Result<(), StoreError>)>,
    created: Vec<(PlannedCreate, Result<RowId, StoreError>)>,
    updated: Vec<(PlannedUpdate, Result<(), StoreError>)>,
    settled: Vec<RowId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReport {
    /// Rows whose pending work reached the store
    pub committed: Vec<RowKey>,
    /// Ids assigned to created rows
    pub created: Vec<(PendingId, RowId)>,
    pub deleted: Vec<RowId>,
    /// Positions written for ordered rows
    pub positions: Vec<(Scope, RowId, i64)>,
    /// One entry per row left unsaved
    pub failures: Vec<LedgerError>,
}

impl CommitReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn new_id(&self, pending: &PendingId) -> Option<&RowId> {
        self.created
            .iter()
            .find(|(p, _)| p == pending)
            .map(|(_, id)| id)
    }

    pub fn failure(&self, row: &RowKey) -> Option<&LedgerError> {
        self.failures.iter().find(|e| e.row() == Some(row))
    }

    fn resolve<'a>(&self, values: impl Iterator<Item = &'a mut FieldValue>) {
        for value in values {
            for (pending, id) in &self.created {
                value.resolve(pending, id);
            }
        }
    }
}

impl CommitCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CommitState {
        self.state
    }

    /// Snapshot and plan the change set.
    ///
    /// Rows that fail validation are left out and reported by `finish`; the rest go
    /// ahead. Fails with `Concurrency` while another commit is outstanding.
    pub fn begin(
        &mut self,
        changes: &mut ChangeSet,
        listing: &SortListing,
    ) -> Result<PreparedCommit, LedgerError> {
        if self.state == CommitState::Committing {
            return Err(LedgerError::Concurrency);
        }

        let mut snapshot = changes.snapshot();
        let mut blocked = Vec::new();
        loop {
            let issues = ReconciliationPlanner::validate(&snapshot);
            let invalid: HashSet<RowKey> = issues.iter().filter_map(|e| e.row().cloned()).collect();
            if invalid.is_empty() {
                break;
            }
            for issue in &issues {
                tracing::warn!("Holding back {}", issue);
            }
            snapshot.retain(|r| !invalid.contains(r.key()));
            blocked.extend(issues);
        }

        let plan = ReconciliationPlanner::plan(&snapshot, listing)?;
        changes.mark_in_flight(snapshot.keys());
        self.generation += 1;
        self.state = CommitState::Committing;
        tracing::info!(
            "Commit {} started: {} calls, {} rows held back",
            self.generation,
            plan.len(),
            blocked.len()
        );

        Ok(PreparedCommit {
            generation: self.generation,
            snapshot,
            plan,
            blocked,
        })
    }

    /// Settle an executed commit into the change set
    pub fn finish(&mut self, changes: &mut ChangeSet, outcome: CommitOutcome) -> CommitReport {
        if outcome.generation != self.generation {
            tracing::warn!(
                "Settling commit {} while commit {} is current",
                outcome.generation,
                self.generation
            );
        }
        let CommitOutcome {
            snapshot,
            blocked,
            deleted,
            created,
            updated,
            settled,
            ..
        } = outcome;
        let mut report = CommitReport {
            failures: blocked,
            ..CommitReport::default()
        };

        for (delete, result) in deleted {
            let key = RowKey::Persisted(delete.id.clone());
            match result {
                Ok(()) => {
                    changes.settle_deleted(&key);
                    report.deleted.push(delete.id);
                    report.committed.push(key);
                }
                Err(e) => report.failures.push(LedgerError::remote(&key, e)),
            }
        }

        for (mut create, result) in created {
            let key = RowKey::Pending(create.key.clone());
            match result {
                Ok(id) => {
                    report.resolve(create.fields.iter_mut().map(|(_, v)| v));
                    changes.settle_created(&create.key, &id, &snapshot, &create.fields);
                    if let Some((scope, position)) = create.position {
                        report.positions.push((scope, id.clone(), position));
                    }
                    report.created.push((create.key, id));
                    report.committed.push(key);
                }
                Err(e) => {
                    changes.settle_failed_creation(&create.key);
                    report.failures.push(LedgerError::remote(&key, e));
                }
            }
        }

        for (mut update, result) in updated {
            let key = RowKey::Persisted(update.id.clone());
            let pending = snapshot.get(&key);
            match result {
                Ok(()) => {
                    report.resolve(
                        update
                            .fields
                            .iter_mut()
                            .flat_map(|(_, slot)| [&mut slot.value, &mut slot.baseline]),
                    );
                    changes.settle_updated(&update.id, pending, &update.fields);
                    if let Some((scope, position)) = update.position {
                        report.positions.push((scope, update.id.clone(), position));
                    }
                    if pending.is_some() {
                        report.committed.push(key);
                    }
                }
                Err(e) => report.failures.push(LedgerError::remote(&key, e)),
            }
        }

        for id in settled {
            let key = RowKey::Persisted(id.clone());
            changes.settle_updated(&id, snapshot.get(&key), &[]);
            report.committed.push(key);
        }

        let created_ids = report.created.clone();
        for (scope, _, _) in report.positions.iter_mut() {
            for (pending, id) in &created_ids {
                scope.resolve(pending, id);
            }
        }

        changes.clear_in_flight();
        self.state = if report.is_success() {
            CommitState::Idle
        } else {
            CommitState::Failed
        };
        tracing::info!(
            "Commit {} settled: {} rows saved, {} failed",
            self.generation,
            report.committed.len(),
            report.failures.len()
        );
        report
    }

    /// Give up on an outstanding commit whose results will never arrive
    pub fn abandon(&mut self, changes: &mut ChangeSet) {
        if self.state == CommitState::Committing {
            tracing::warn!("Commit {} abandoned", self.generation);
            changes.clear_in_flight();
            self.state = CommitState::Failed;
        }
    }
}

impl PreparedCommit {
    pub fn plan(&self) -> &ReconciliationPlan {
        &self.plan
    }

    pub fn blocked(&self) -> &[LedgerError] {
        &self.blocked
    }

    /// Send every planned call, one per row. A failed call fails only its row and
    /// rows that reference it.
    pub async fn execute<S, I>(self, store: &S, identity: &I) -> CommitOutcome
    where
        S: RowStore,
        I: Identity,
    {
        let PreparedCommit {
            generation,
            snapshot,
            plan,
            blocked,
        } = self;
        let mut outcome = CommitOutcome {
            generation,
            snapshot,
            blocked,
            deleted: Vec::new(),
            created: Vec::new(),
            updated: Vec::new(),
            settled: plan.settled,
        };

        for delete in plan.deletes {
            let result = store.delete(delete.kind, &delete.id).await;
            if let Err(e) = &result {
                tracing::warn!("Failed to delete {} {}: {}", delete.kind, delete.id, e);
            }
            outcome.deleted.push((delete, result));
        }

        let mut created: HashMap<PendingId, RowId> = HashMap::new();
        if !plan.creates.is_empty() {
            let owner = identity.current_user_id().map_err(StoreError::from);
            if let Err(e) = &owner {
                tracing::error!("Cannot create rows: {}", e);
            }

            for create in plan.creates {
                let result = match &owner {
                    Ok(user_id) => insert_row(store, &create, user_id, &created).await,
                    Err(e) => Err(e.clone()),
                };
                match &result {
                    Ok(id) => {
                        tracing::debug!("Created {} {} as {}", create.kind, create.key, id);
                        created.insert(create.key.clone(), id.clone());
                    }
                    Err(e) => tracing::warn!("Failed to create {} {}: {}", create.kind, create.key, e),
                }
                outcome.created.push((create, result));
            }
        }

        for update in plan.updates {
            let values = update.fields.iter().map(|(f, slot)| (*f, &slot.value));
            let result = match payload(values, &created) {
                Ok(patch) => store.update(update.kind, &update.id, patch).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                tracing::warn!("Failed to update {} {}: {}", update.kind, update.id, e);
            }
            outcome.updated.push((update, result));
        }

        outcome
    }
}

async fn insert_row<S: RowStore>(
    store: &S,
    create: &PlannedCreate,
    user_id: &str,
    created: &HashMap<PendingId, RowId>,
) -> Result<RowId, StoreError> {
    let mut row = payload(create.fields.iter().map(|(f, v)| (*f, v)), created)?;
    row.insert("user_id".to_string(), serde_json::Value::from(user_id));
    store.insert(create.kind, row).await
}

/// Column/value map for the wire, with references to rows created earlier in the
/// commit swapped for their new ids
fn payload<'a>(
    fields: impl IntoIterator<Item = (Field, &'a FieldValue)>,
    created: &HashMap<PendingId, RowId>,
) -> Result<RowPayload, StoreError> {
    let mut row = RowPayload::new();
    for (field, value) in fields {
        let json = match value {
            FieldValue::Ref(RowKey::Pending(pending)) => match created.get(pending) {
                Some(id) => serde_json::Value::from(id.as_str()),
                None => return Err(StoreError::ParentNotCreated(RowKey::Pending(pending.clone()))),
            },
            other => other.to_json().unwrap_or_default(),
        };
        row.insert(field.column().to_string(), json);
    }
    Ok(row)
}
