//! Unsaved edits, keyed by row.
//!
//! Every row with pending work has exactly one record: field edits on a saved row,
//! a creation of a locally minted row, or a deletion. Records never sit empty; a
//! field edited back to its committed value drops out, and the record with it.

mod diff;
mod fields;

pub use fields::{
    AccountChange, AccountField, CategoryChange, CategoryField, EntityKind, Field, FieldValue,
    ItemChange, ItemField, PendingValue, RowChange, TransactionChange, TransactionField,
    ValueType,
};

use crate::error::LedgerError;
use crate::identity::{PendingId, RowKey};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tally_api::endpoints::RowId;

/// Where a created row goes among its siblings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "at", content = "anchor", rename_all = "snake_case")]
pub enum Placement {
    #[default]
    End,
    Start,
    After(RowKey),
    Before(RowKey),
}

impl Placement {
    pub fn anchor(&self) -> Option<&RowKey> {
        match self {
            Placement::After(key) | Placement::Before(key) => Some(key),
            Placement::End | Placement::Start => None,
        }
    }

    fn resolve(&mut self, pending: &PendingId, id: &RowId) {
        if let Placement::After(key) | Placement::Before(key) = self {
            if key.pending() == Some(pending) {
                *key = RowKey::Persisted(id.clone());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecordState {
    Edit,
    Create { placement: Placement },
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChangeRecord {
    key: RowKey,
    change: RowChange,
    state: RecordState,
    /// Order the row first entered the change set
    seq: u64,
    /// Bumped on every mutation; compared against a commit snapshot at settle time
    revision: u64,
}

impl RowChangeRecord {
    fn new(key: RowKey, kind: EntityKind, state: RecordState, seq: u64, revision: u64) -> Self {
        Self {
            key,
            change: RowChange::empty(kind),
            state,
            seq,
            revision,
        }
    }

    pub fn key(&self) -> &RowKey {
        &self.key
    }

    pub fn kind(&self) -> EntityKind {
        self.change.kind()
    }

    pub fn change(&self) -> &RowChange {
        &self.change
    }

    pub fn state(&self) -> &RecordState {
        &self.state
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_pending_creation(&self) -> bool {
        matches!(self.state, RecordState::Create { .. })
    }

    pub fn is_pending_deletion(&self) -> bool {
        matches!(self.state, RecordState::Delete)
    }

    pub fn placement(&self) -> Option<&Placement> {
        match &self.state {
            RecordState::Create { placement } => Some(placement),
            _ => None,
        }
    }

    pub fn pending_fields(&self) -> Vec<(Field, &PendingValue)> {
        self.change.fields()
    }

    pub fn value(&self, field: impl Into<Field>) -> Option<&FieldValue> {
        self.change.slot(field.into()).map(|slot| &slot.value)
    }

    fn is_noop(&self) -> bool {
        matches!(self.state, RecordState::Edit) && self.change.is_empty()
    }

    fn references(&self, target: &RowKey) -> bool {
        self.change
            .fields()
            .iter()
            .any(|(_, slot)| slot.value.reference() == Some(target))
    }

    fn resolve(&mut self, pending: &PendingId, id: &RowId) {
        self.change.for_each_slot(|slot| slot.resolve(pending, id));
        if let RecordState::Create { placement } = &mut self.state {
            placement.resolve(pending, id);
        }
    }
}

/// Frozen copy of the records a commit works from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSetSnapshot {
    records: Vec<RowChangeRecord>,
}

impl ChangeSetSnapshot {
    pub fn records(&self) -> &[RowChangeRecord] {
        &self.records
    }

    pub fn get(&self, key: &RowKey) -> Option<&RowChangeRecord> {
        self.records.iter().find(|r| &r.key == key)
    }

    pub fn retain(&mut self, keep: impl FnMut(&RowChangeRecord) -> bool) {
        self.records.retain(keep);
    }

    pub fn keys(&self) -> impl Iterator<Item = &RowKey> {
        self.records.iter().map(|r| &r.key)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    records: HashMap<RowKey, RowChangeRecord>,
    clock: u64,
    next_seq: u64,
    in_flight: HashSet<RowKey>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from records saved earlier, e.g. a restored draft
    pub fn from_records(records: Vec<RowChangeRecord>) -> Self {
        let mut changes = Self::new();
        for record in records {
            if record.is_noop() {
                continue;
            }
            changes.clock = changes.clock.max(record.revision);
            changes.next_seq = changes.next_seq.max(record.seq + 1);
            changes.records.insert(record.key.clone(), record);
        }
        changes
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn get(&self, key: &RowKey) -> Option<&RowChangeRecord> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.records.contains_key(key)
    }

    /// Records in the order their rows were first touched
    pub fn records(&self) -> Vec<&RowChangeRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    /// Most recently modified row
    pub fn last_edited(&self) -> Option<&RowKey> {
        self.records
            .values()
            .max_by_key(|r| r.revision)
            .map(|r| &r.key)
    }

    fn next_revision(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn insert_record(&mut self, key: RowKey, kind: EntityKind, state: RecordState) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let revision = self.next_revision();
        self.records.insert(
            key.clone(),
            RowChangeRecord::new(key, kind, state, seq, revision),
        );
        revision
    }

    /// Register a new row under a locally minted id, seeded with `fields`.
    ///
    /// Created rows diff against `Empty`: every non-empty field is pending.
    pub fn mark_creation(
        &mut self,
        key: RowKey,
        kind: EntityKind,
        fields: Vec<(Field, FieldValue)>,
        placement: Placement,
    ) -> Result<(), LedgerError> {
        if !key.is_pending() {
            return Err(LedgerError::validation(
                &key,
                "only locally minted ids can be created",
            ));
        }
        if self.records.contains_key(&key) {
            return Err(LedgerError::validation(&key, "row is already pending"));
        }

        let mut change = RowChange::empty(kind);
        for (field, value) in fields {
            let value = value.normalized();
            diff::check_field(&key, kind, field, &value)?;
            if value.is_empty() {
                continue;
            }
            if let Some(slot) = change.slot_mut(field) {
                *slot = Some(PendingValue {
                    value,
                    baseline: FieldValue::Empty,
                });
            }
        }

        self.insert_record(key.clone(), kind, RecordState::Create { placement });
        if let Some(record) = self.records.get_mut(&key) {
            record.change = change;
        }
        tracing::debug!("Marked {} {} for creation", kind, key);
        Ok(())
    }

    /// Queue `key` for deletion.
    ///
    /// A row that was only ever pending creation is dropped outright, together with
    /// pending rows created under it. While a commit is sending that creation the
    /// record instead becomes a deletion, settled once the store assigns an id.
    pub fn mark_deletion(&mut self, key: &RowKey, kind: EntityKind) -> Result<(), LedgerError> {
        let in_flight = self.in_flight.contains(key);
        let existing = self.records.get(key).map(|r| (r.kind(), r.state.clone()));
        match existing {
            Some((existing_kind, _)) if existing_kind != kind => {
                return Err(LedgerError::validation(
                    key,
                    format!("row is a {}, not a {}", existing_kind, kind),
                ))
            }
            Some((_, RecordState::Delete)) => return Ok(()),
            Some((_, RecordState::Create { .. })) if !in_flight => {
                self.drop_creation(key);
                return Ok(());
            }
            Some(_) => {}
            None if key.is_pending() => {
                return Err(LedgerError::validation(key, "unknown pending row"))
            }
            None => {
                self.insert_record(key.clone(), kind, RecordState::Delete);
                self.drop_dependents(key);
                tracing::debug!("Marked {} {} for deletion", kind, key);
                return Ok(());
            }
        }

        let revision = self.next_revision();
        if let Some(record) = self.records.get_mut(key) {
            record.state = RecordState::Delete;
            record.change.clear();
            record.revision = revision;
        }
        self.drop_dependents(key);
        tracing::debug!("Marked {} {} for deletion", kind, key);
        Ok(())
    }

    /// Remove a pending creation and, transitively, creations that reference it
    fn drop_creation(&mut self, key: &RowKey) {
        if self.records.remove(key).is_some() {
            tracing::debug!("Dropped pending row {}", key);
        }
        self.drop_dependents(key);
    }

    fn drop_dependents(&mut self, parent: &RowKey) {
        let children: Vec<RowKey> = self
            .records
            .values()
            .filter(|r| r.is_pending_creation() && r.references(parent))
            .map(|r| r.key.clone())
            .collect();

        for child in children {
            if self.in_flight.contains(&child) {
                let revision = self.next_revision();
                if let Some(record) = self.records.get_mut(&child) {
                    record.state = RecordState::Delete;
                    record.change.clear();
                    record.revision = revision;
                }
            } else {
                self.drop_creation(&child);
            }
        }
    }

    /// Forget everything pending for `key`, as if it had never been touched
    pub fn remove_row(&mut self, key: &RowKey) -> Option<RowChangeRecord> {
        self.records.remove(key)
    }

    /// Revert a row's pending work. Reverting a creation behaves like deleting it.
    pub fn discard(&mut self, key: &RowKey) -> bool {
        let Some(record) = self.records.get(key) else {
            return false;
        };
        if record.is_pending_creation() {
            let kind = record.kind();
            return self.mark_deletion(key, kind).is_ok();
        }
        self.records.remove(key);
        true
    }

    /// Revert whichever row was modified most recently
    pub fn discard_last(&mut self) -> Option<RowKey> {
        let key = self.last_edited()?.clone();
        self.discard(&key).then_some(key)
    }

    pub fn snapshot(&self) -> ChangeSetSnapshot {
        let mut records: Vec<RowChangeRecord> = self.records.values().cloned().collect();
        records.sort_by_key(|r| r.seq);
        ChangeSetSnapshot { records }
    }

    pub(crate) fn mark_in_flight<'a>(&mut self, keys: impl IntoIterator<Item = &'a RowKey>) {
        self.in_flight = keys.into_iter().cloned().collect();
    }

    pub(crate) fn clear_in_flight(&mut self) {
        self.in_flight.clear();
    }

    pub fn is_in_flight(&self, key: &RowKey) -> bool {
        self.in_flight.contains(key)
    }

    /// Point every reference and placement anchor at `pending` to the row it became
    pub fn resolve_pending(&mut self, pending: &PendingId, id: &RowId) {
        for record in self.records.values_mut() {
            record.resolve(pending, id);
        }
    }

    pub(crate) fn settle_deleted(&mut self, key: &RowKey) {
        self.records.remove(key);
    }

    /// A creation reached the store as `id`.
    ///
    /// Edits made while it was in flight are kept as edits of the new row, diffed
    /// against what was sent.
    pub(crate) fn settle_created(
        &mut self,
        pending: &PendingId,
        id: &RowId,
        sent: &ChangeSetSnapshot,
        committed: &[(Field, FieldValue)],
    ) {
        let pending_key = RowKey::Pending(pending.clone());
        if let Some(mut record) = self.records.remove(&pending_key) {
            let snapshot = sent.get(&pending_key);
            let unchanged = snapshot.is_some_and(|s| s.revision == record.revision);
            if !unchanged {
                record.key = RowKey::Persisted(id.clone());
                if record.is_pending_creation() {
                    diff::rebase_creation(&mut record, snapshot, committed);
                    record.state = RecordState::Edit;
                }
                if !record.is_noop() {
                    self.records.insert(record.key.clone(), record);
                }
            }
        }
        self.in_flight.remove(&pending_key);
        self.resolve_pending(pending, id);
    }

    /// An update reached the store. `committed` holds each sent value with the
    /// baseline it replaced; `snapshot` is the row as the commit saw it, if it was pending.
    pub(crate) fn settle_updated(
        &mut self,
        id: &RowId,
        snapshot: Option<&RowChangeRecord>,
        committed: &[(Field, PendingValue)],
    ) {
        let key = RowKey::Persisted(id.clone());
        if !self.records.contains_key(&key) {
            // reverted or discarded while in flight: the store now differs from what the user sees
            let Some(sent) = snapshot else {
                return;
            };
            self.insert_record(key.clone(), sent.kind(), RecordState::Edit);
        }
        let Some(record) = self.records.get_mut(&key) else {
            return;
        };
        if snapshot.is_some_and(|s| s.revision == record.revision) {
            self.records.remove(&key);
            return;
        }
        if record.is_pending_deletion() {
            return;
        }

        diff::rebase_update(record, snapshot, committed);
        if record.is_noop() {
            self.records.remove(&key);
        }
    }

    /// A creation was rejected; a deletion queued behind it has nothing left to delete
    pub(crate) fn settle_failed_creation(&mut self, pending: &PendingId) {
        let key = RowKey::Pending(pending.clone());
        if self.records.get(&key).is_some_and(|r| r.is_pending_deletion()) {
            self.records.remove(&key);
        }
    }
}
