//! Turns a change-set snapshot into the calls a commit makes: deletes child-first,
//! creates parent-first, then updates. New rows in ordered lists get positions
//! between their neighbours, renumbering the list when there is no room.

use crate::changes::{
    AccountField, ChangeSetSnapshot, EntityKind, Field, FieldValue, ItemField, PendingValue,
    Placement, RecordState,
};
use crate::commit::CommitReport;
use crate::error::LedgerError;
use crate::identity::{PendingId, RowKey};
use itertools::Itertools;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use tally_api::endpoints::{accounts::AccountType, query::PositionRow, RowId};

/// Spacing between positions handed out at either end of a list
pub const POSITION_GAP: i64 = 1000;

/// A list whose rows are ordered by `sort_order`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Accounts,
    Categories,
    /// Items of one transaction
    Items(RowKey),
}

impl Scope {
    pub fn kind(&self) -> EntityKind {
        match self {
            Scope::Accounts => EntityKind::Account,
            Scope::Categories => EntityKind::Category,
            Scope::Items(_) => EntityKind::Item,
        }
    }

    pub(crate) fn resolve(&mut self, pending: &PendingId, id: &RowId) {
        if let Scope::Items(key) = self {
            if key.pending() == Some(pending) {
                *key = RowKey::Persisted(id.clone());
            }
        }
    }
}

/// Committed positions of saved rows, per ordered list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortListing {
    scopes: HashMap<Scope, Vec<(RowId, i64)>>,
}

impl SortListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_scope(&mut self, scope: Scope, rows: impl IntoIterator<Item = (RowId, i64)>) {
        let mut rows: Vec<(RowId, i64)> = rows.into_iter().collect();
        rows.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        self.scopes.insert(scope, rows);
    }

    /// Replace the lists of `kind` with rows read from the store
    pub fn load(&mut self, kind: EntityKind, rows: Vec<PositionRow>) {
        match kind {
            EntityKind::Account => {
                self.set_scope(Scope::Accounts, rows.into_iter().map(|r| (r.id, r.sort_order)))
            }
            EntityKind::Category => self.set_scope(
                Scope::Categories,
                rows.into_iter().map(|r| (r.id, r.sort_order)),
            ),
            EntityKind::Item => {
                self.scopes.retain(|scope, _| !matches!(scope, Scope::Items(_)));
                let groups = rows
                    .into_iter()
                    .filter_map(|r| r.parent_id.map(|parent| (parent, (r.id, r.sort_order))))
                    .into_group_map();
                for (parent, rows) in groups {
                    self.set_scope(Scope::Items(RowKey::Persisted(parent)), rows);
                }
            }
            EntityKind::Transaction => {}
        }
    }

    pub fn rows(&self, scope: &Scope) -> &[(RowId, i64)] {
        self.scopes.get(scope).map_or(&[], Vec::as_slice)
    }

    pub fn position_of(&self, id: &RowId) -> Option<(&Scope, i64)> {
        self.scopes.iter().find_map(|(scope, rows)| {
            rows.iter()
                .find(|(row, _)| row == id)
                .map(|(_, position)| (scope, *position))
        })
    }

    pub fn remove(&mut self, id: &RowId) {
        for rows in self.scopes.values_mut() {
            rows.retain(|(row, _)| row != id);
        }
    }

    pub fn upsert(&mut self, scope: Scope, id: RowId, position: i64) {
        self.remove(&id);
        let rows = self.scopes.entry(scope).or_default();
        rows.push((id, position));
        rows.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    }

    /// Fold the outcome of a commit in, so the next plan sees the rows it saved
    pub fn apply(&mut self, report: &CommitReport) {
        for id in &report.deleted {
            self.remove(id);
        }
        for (scope, id, position) in &report.positions {
            self.upsert(scope.clone(), id.clone(), *position);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCreate {
    pub key: PendingId,
    pub kind: EntityKind,
    /// Values to insert, references possibly still pending
    pub fields: Vec<(Field, FieldValue)>,
    pub position: Option<(Scope, i64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub id: RowId,
    pub kind: EntityKind,
    /// Only the fields that changed
    pub fields: Vec<(Field, PendingValue)>,
    pub position: Option<(Scope, i64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDelete {
    pub id: RowId,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub deletes: Vec<PlannedDelete>,
    pub creates: Vec<PlannedCreate>,
    pub updates: Vec<PlannedUpdate>,
    /// Saved rows whose pending move needs no call: renumbering put them back at the
    /// position the store already holds
    pub settled: Vec<RowId>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty()
            && self.creates.is_empty()
            && self.updates.is_empty()
            && self.settled.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deletes.len() + self.creates.len() + self.updates.len()
    }
}

pub struct ReconciliationPlanner;

impl ReconciliationPlanner {
    /// Everything that keeps rows of `snapshot` from being committed
    pub fn validate(snapshot: &ChangeSetSnapshot) -> Vec<LedgerError> {
        let deleting: HashSet<&RowKey> = snapshot
            .records()
            .iter()
            .filter(|r| r.is_pending_deletion())
            .map(|r| r.key())
            .collect();
        let creating: HashSet<&PendingId> = snapshot
            .records()
            .iter()
            .filter(|r| r.is_pending_creation())
            .filter_map(|r| r.key().pending())
            .collect();

        let mut issues = Vec::new();
        for record in snapshot.records() {
            let key = record.key();
            match record.state() {
                RecordState::Delete => continue,
                RecordState::Create { .. } => {
                    for field in record.kind().required_fields() {
                        if record.value(field).is_none_or(FieldValue::is_empty) {
                            issues.push(LedgerError::validation(
                                key,
                                format!("missing required field `{}`", field.column()),
                            ));
                        }
                    }
                }
                RecordState::Edit => {
                    for (field, slot) in record.pending_fields() {
                        if field.is_required() && slot.value.is_empty() {
                            issues.push(LedgerError::validation(
                                key,
                                format!("`{}` cannot be empty", field.column()),
                            ));
                        }
                    }
                }
            }

            for (field, slot) in record.pending_fields() {
                if let Some(target) = slot.value.reference() {
                    if deleting.contains(target) {
                        issues.push(LedgerError::validation(
                            key,
                            format!(
                                "`{}` references {}, which is pending deletion",
                                field.column(),
                                target
                            ),
                        ));
                    } else if target.pending().is_some_and(|p| !creating.contains(p)) {
                        issues.push(LedgerError::validation(
                            key,
                            format!(
                                "`{}` references unknown pending row {}",
                                field.column(),
                                target
                            ),
                        ));
                    }
                }
                if field == Field::Account(AccountField::AccountType) {
                    if let FieldValue::Text(text) = &slot.value {
                        if let Err(e) = AccountType::from_str(text) {
                            issues.push(LedgerError::validation(key, e.to_string()));
                        }
                    }
                }
            }
        }
        issues
    }

    pub fn plan(
        snapshot: &ChangeSetSnapshot,
        listing: &SortListing,
    ) -> Result<ReconciliationPlan, LedgerError> {
        if let Some(issue) = Self::validate(snapshot).into_iter().next() {
            return Err(issue);
        }

        let mut plan = ReconciliationPlan::default();
        for record in snapshot.records() {
            let kind = record.kind();
            match (record.state(), record.key()) {
                (RecordState::Delete, RowKey::Persisted(id)) => plan.deletes.push(PlannedDelete {
                    id: id.clone(),
                    kind,
                }),
                (RecordState::Create { .. }, RowKey::Pending(key)) => {
                    plan.creates.push(PlannedCreate {
                        key: key.clone(),
                        kind,
                        fields: record
                            .pending_fields()
                            .into_iter()
                            .map(|(f, slot)| (f, slot.value.clone()))
                            .collect(),
                        position: None,
                    })
                }
                (RecordState::Edit, RowKey::Persisted(id)) => plan.updates.push(PlannedUpdate {
                    id: id.clone(),
                    kind,
                    fields: record
                        .pending_fields()
                        .into_iter()
                        .map(|(f, slot)| (f, slot.clone()))
                        .collect(),
                    position: None,
                }),
                // a deletion of a row the store never saw
                (RecordState::Delete, RowKey::Pending(_)) => {}
                (state, key) => {
                    tracing::warn!("Skipping {:?} record under {}", state, key);
                }
            }
        }

        // stable sorts keep edit order within a kind
        plan.deletes.sort_by_key(|d| Reverse(d.kind.rank()));
        plan.creates.sort_by_key(|c| c.kind.rank());

        let deleted: HashSet<RowId> = plan.deletes.iter().map(|d| d.id.clone()).collect();
        assign_positions(snapshot, listing, &deleted, &mut plan);

        for update in plan.updates.iter_mut().filter(|u| u.position.is_none()) {
            let Some(sort_field) = update.kind.sort_field() else {
                continue;
            };
            let moved_to = update
                .fields
                .iter()
                .find(|(f, _)| *f == sort_field)
                .and_then(|(_, slot)| slot.value.as_integer());
            if let (Some(position), Some((scope, _))) = (moved_to, listing.position_of(&update.id))
            {
                update.position = Some((scope.clone(), position));
            }
        }

        tracing::debug!(
            "Planned {} deletes, {} creates, {} updates",
            plan.deletes.len(),
            plan.creates.len(),
            plan.updates.len()
        );
        Ok(plan)
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Existing(RowId, i64),
    New(usize),
}

fn create_scope(create: &PlannedCreate) -> Option<Scope> {
    match create.kind {
        EntityKind::Account => Some(Scope::Accounts),
        EntityKind::Category => Some(Scope::Categories),
        EntityKind::Item => create
            .fields
            .iter()
            .find(|(f, _)| *f == Field::Item(ItemField::Transaction))
            .and_then(|(_, v)| v.reference())
            .map(|parent| Scope::Items(parent.clone())),
        EntityKind::Transaction => None,
    }
}

fn assign_positions(
    snapshot: &ChangeSetSnapshot,
    listing: &SortListing,
    deleted: &HashSet<RowId>,
    plan: &mut ReconciliationPlan,
) {
    let mut groups: BTreeMap<Scope, Vec<usize>> = BTreeMap::new();
    for (idx, create) in plan.creates.iter_mut().enumerate() {
        let (Some(sort_field), Some(scope)) = (create.kind.sort_field(), create_scope(create))
        else {
            continue;
        };
        let chosen = create
            .fields
            .iter()
            .find(|(f, _)| *f == sort_field)
            .and_then(|(_, v)| v.as_integer());
        match chosen {
            Some(position) => create.position = Some((scope, position)),
            None => groups.entry(scope).or_default().push(idx),
        }
    }

    for (scope, members) in groups {
        place_in_scope(snapshot, listing, deleted, plan, scope, members);
    }
}

fn place_in_scope(
    snapshot: &ChangeSetSnapshot,
    listing: &SortListing,
    deleted: &HashSet<RowId>,
    plan: &mut ReconciliationPlan,
    scope: Scope,
    members: Vec<usize>,
) {
    let Some(sort_field) = scope.kind().sort_field() else {
        return;
    };

    // rows being moved in this commit sit at their new position
    let moved: HashMap<&RowId, i64> = plan
        .updates
        .iter()
        .filter_map(|u| {
            u.fields
                .iter()
                .find(|(f, _)| *f == sort_field)
                .and_then(|(_, slot)| slot.value.as_integer())
                .map(|position| (&u.id, position))
        })
        .collect();
    let mut sequence: Vec<Slot> = listing
        .rows(&scope)
        .iter()
        .filter(|(id, _)| !deleted.contains(id))
        .map(|(id, position)| (moved.get(id).copied().unwrap_or(*position), id.clone()))
        .sorted()
        .map(|(position, id)| Slot::Existing(id, position))
        .collect();
    let committed: HashMap<RowId, i64> = listing.rows(&scope).iter().cloned().collect();

    let mut start_cursor = 0;
    for idx in members {
        let key = RowKey::Pending(plan.creates[idx].key.clone());
        let placement = snapshot
            .get(&key)
            .and_then(|r| r.placement())
            .cloned()
            .unwrap_or_default();
        let find = |anchor: &RowKey| {
            sequence.iter().position(|slot| match slot {
                Slot::Existing(id, _) => anchor.persisted() == Some(id),
                Slot::New(i) => anchor.pending() == Some(&plan.creates[*i].key),
            })
        };
        let at = match &placement {
            Placement::End => sequence.len(),
            Placement::Start => start_cursor,
            Placement::After(anchor) => find(anchor).map_or(sequence.len(), |i| i + 1),
            Placement::Before(anchor) => find(anchor).unwrap_or(sequence.len()),
        };
        if matches!(placement, Placement::Start) || at < start_cursor {
            start_cursor += 1;
        }
        sequence.insert(at, Slot::New(idx));
    }

    let assigned = match interpolate(&sequence) {
        Some(assigned) => assigned,
        None => {
            tracing::info!("No room between positions in {:?}, renumbering", scope);
            renumber(&sequence, &committed, plan, &scope, sort_field)
        }
    };

    for (idx, position) in assigned {
        let create = &mut plan.creates[idx];
        create.fields.push((sort_field, FieldValue::Integer(position)));
        create.position = Some((scope.clone(), position));
    }
}

/// Positions for each run of new rows, strictly between the rows around it.
/// `None` when some run does not fit.
fn interpolate(sequence: &[Slot]) -> Option<Vec<(usize, i64)>> {
    let position_at = |i: usize| match &sequence[i] {
        Slot::Existing(_, position) => Some(*position),
        Slot::New(_) => None,
    };

    let mut assigned = Vec::new();
    let mut i = 0;
    while i < sequence.len() {
        if position_at(i).is_some() {
            i += 1;
            continue;
        }
        let start = i;
        while i < sequence.len() && position_at(i).is_none() {
            i += 1;
        }
        let left = start.checked_sub(1).and_then(position_at);
        let right = (i < sequence.len()).then(|| position_at(i)).flatten();
        let positions = spread(left, right, i - start)?;

        for (slot, position) in sequence[start..i].iter().zip(positions) {
            if let Slot::New(idx) = slot {
                assigned.push((*idx, position));
            }
        }
    }
    Some(assigned)
}

fn spread(left: Option<i64>, right: Option<i64>, count: usize) -> Option<Vec<i64>> {
    let n = count as i64;
    match (left, right) {
        (Some(l), Some(r)) => {
            let gap = r - l;
            if gap <= n {
                return None;
            }
            Some((1..=n).map(|k| l + gap * k / (n + 1)).collect())
        }
        (Some(l), None) => Some((1..=n).map(|k| l + POSITION_GAP * k).collect()),
        (None, Some(r)) => Some((0..n).map(|k| r - POSITION_GAP * (n - k)).collect()),
        (None, None) => Some((1..=n).map(|k| POSITION_GAP * k).collect()),
    }
}

/// Evenly respace the whole list, moving saved rows whose position changes
fn renumber(
    sequence: &[Slot],
    committed: &HashMap<RowId, i64>,
    plan: &mut ReconciliationPlan,
    scope: &Scope,
    sort_field: Field,
) -> Vec<(usize, i64)> {
    let mut assigned = Vec::new();
    for (i, slot) in sequence.iter().enumerate() {
        let position = POSITION_GAP * (i as i64 + 1);
        match slot {
            Slot::New(idx) => assigned.push((*idx, position)),
            Slot::Existing(id, current) => {
                let baseline = committed.get(id).copied().unwrap_or(*current);
                move_row(plan, scope, sort_field, id, baseline, position);
            }
        }
    }
    assigned
}

/// Send `id` to `position`, diffed against the position the store holds
fn move_row(
    plan: &mut ReconciliationPlan,
    scope: &Scope,
    sort_field: Field,
    id: &RowId,
    baseline: i64,
    position: i64,
) {
    let slot = (position != baseline).then(|| {
        (
            sort_field,
            PendingValue {
                value: FieldValue::Integer(position),
                baseline: FieldValue::Integer(baseline),
            },
        )
    });

    let Some(i) = plan.updates.iter().position(|u| &u.id == id) else {
        if let Some(slot) = slot {
            plan.updates.push(PlannedUpdate {
                id: id.clone(),
                kind: scope.kind(),
                fields: vec![slot],
                position: Some((scope.clone(), position)),
            });
        }
        return;
    };

    let update = &mut plan.updates[i];
    update.fields.retain(|(f, _)| *f != sort_field);
    update.position = None;
    if let Some(slot) = slot {
        update.fields.push(slot);
        update.position = Some((scope.clone(), position));
    }
    if update.fields.is_empty() {
        let update = plan.updates.remove(i);
        plan.settled.push(update.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{CategoryField, ChangeSet, TransactionField};
    use crate::identity::allocate_pending_id;
    use chrono::NaiveDate;
    use tally_api::endpoints::Cents;

    // ===== Helper Functions =====

    fn saved(id: &str) -> RowKey {
        RowKey::Persisted(RowId::from(id))
    }

    fn category_listing(rows: &[(&str, i64)]) -> SortListing {
        let mut listing = SortListing::new();
        listing.set_scope(
            Scope::Categories,
            rows.iter().map(|(id, pos)| (RowId::from(*id), *pos)),
        );
        listing
    }

    fn create_category(changes: &mut ChangeSet, name: &str, placement: Placement) -> PendingId {
        let key = allocate_pending_id();
        changes
            .mark_creation(
                key.clone().into(),
                EntityKind::Category,
                vec![(CategoryField::Name.into(), name.into())],
                placement,
            )
            .unwrap();
        key
    }

    fn create_transaction(changes: &mut ChangeSet) -> PendingId {
        let key = allocate_pending_id();
        changes
            .mark_creation(
                key.clone().into(),
                EntityKind::Transaction,
                vec![
                    (
                        TransactionField::Date.into(),
                        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap().into(),
                    ),
                    (TransactionField::Description.into(), "Market".into()),
                ],
                Placement::End,
            )
            .unwrap();
        key
    }

    fn create_item(changes: &mut ChangeSet, transaction: RowKey, account: &str) -> PendingId {
        let key = allocate_pending_id();
        changes
            .mark_creation(
                key.clone().into(),
                EntityKind::Item,
                vec![
                    (ItemField::Transaction.into(), transaction.into()),
                    (ItemField::Account.into(), RowId::from(account).into()),
                    (ItemField::Amount.into(), Cents::new(-1500).into()),
                ],
                Placement::End,
            )
            .unwrap();
        key
    }

    fn position_of(plan: &ReconciliationPlan, key: &PendingId) -> i64 {
        plan.creates
            .iter()
            .find(|c| &c.key == key)
            .and_then(|c| c.position.as_ref())
            .map(|(_, p)| *p)
            .unwrap()
    }

    // ===== Positions =====

    #[test]
    fn rows_inserted_between_neighbours_are_interpolated() {
        let mut changes = ChangeSet::new();
        let first = create_category(&mut changes, "Gifts", Placement::After(saved("a")));
        let second = create_category(&mut changes, "Pets", Placement::After(first.clone().into()));
        let listing = category_listing(&[("a", 10), ("b", 20)]);

        let plan = ReconciliationPlanner::plan(&changes.snapshot(), &listing).unwrap();

        assert_eq!(position_of(&plan, &first), 13);
        assert_eq!(position_of(&plan, &second), 16);
        assert!(plan.updates.is_empty());
    }

    #[test]
    fn appends_and_prepends_use_the_gap() {
        let mut changes = ChangeSet::new();
        let last = create_category(&mut changes, "Misc", Placement::End);
        let first = create_category(&mut changes, "Housing", Placement::Start);
        let listing = category_listing(&[("a", 5000), ("b", 6000)]);

        let plan = ReconciliationPlanner::plan(&changes.snapshot(), &listing).unwrap();

        assert_eq!(position_of(&plan, &last), 6000 + POSITION_GAP);
        assert_eq!(position_of(&plan, &first), 5000 - POSITION_GAP);
    }

    #[test]
    fn empty_list_starts_at_the_gap() {
        let mut changes = ChangeSet::new();
        let a = create_category(&mut changes, "One", Placement::End);
        let b = create_category(&mut changes, "Two", Placement::End);

        let plan = ReconciliationPlanner::plan(&changes.snapshot(), &SortListing::new()).unwrap();

        assert_eq!(position_of(&plan, &a), POSITION_GAP);
        assert_eq!(position_of(&plan, &b), 2 * POSITION_GAP);
    }

    #[test]
    fn crowded_list_is_renumbered() {
        let mut changes = ChangeSet::new();
        let new = create_category(&mut changes, "Squeezed", Placement::After(saved("a")));
        let listing = category_listing(&[("a", 10), ("b", 11), ("c", 4000)]);

        let plan = ReconciliationPlanner::plan(&changes.snapshot(), &listing).unwrap();

        assert_eq!(position_of(&plan, &new), 2000);
        let moved: Vec<(&str, FieldValue, FieldValue)> = plan
            .updates
            .iter()
            .map(|u| {
                let (_, slot) = &u.fields[0];
                (u.id.as_str(), slot.value.clone(), slot.baseline.clone())
            })
            .collect();
        assert_eq!(
            moved,
            vec![
                ("a", FieldValue::Integer(1000), FieldValue::Integer(10)),
                ("b", FieldValue::Integer(3000), FieldValue::Integer(11)),
            ]
        );
    }

    #[test]
    fn renumbering_diffs_moved_rows_against_the_store() {
        let mut changes = ChangeSet::new();
        changes
            .set_field(&saved("a"), CategoryField::SortOrder, 10_i64, 1000_i64)
            .unwrap();
        let new = create_category(&mut changes, "Squeezed", Placement::After(saved("a")));
        let listing = category_listing(&[("a", 1000), ("b", 11)]);

        let plan = ReconciliationPlanner::plan(&changes.snapshot(), &listing).unwrap();

        assert_eq!(position_of(&plan, &new), 2000);
        for update in &plan.updates {
            for (field, slot) in &update.fields {
                assert_ne!(slot.value, slot.baseline, "{} {} unchanged", update.id, field);
            }
        }
        let moved: Vec<(&str, FieldValue, FieldValue)> = plan
            .updates
            .iter()
            .map(|u| {
                let (_, slot) = &u.fields[0];
                (u.id.as_str(), slot.value.clone(), slot.baseline.clone())
            })
            .collect();
        assert_eq!(
            moved,
            vec![("b", FieldValue::Integer(3000), FieldValue::Integer(11))]
        );
        assert_eq!(plan.settled, vec![RowId::from("a")]);
    }

    #[test]
    fn explicit_position_wins() {
        let mut changes = ChangeSet::new();
        let key = allocate_pending_id();
        changes
            .mark_creation(
                key.clone().into(),
                EntityKind::Category,
                vec![
                    (CategoryField::Name.into(), "Pinned".into()),
                    (CategoryField::SortOrder.into(), FieldValue::Integer(7)),
                ],
                Placement::End,
            )
            .unwrap();
        let listing = category_listing(&[("a", 10)]);

        let plan = ReconciliationPlanner::plan(&changes.snapshot(), &listing).unwrap();

        assert_eq!(position_of(&plan, &key), 7);
        let sort_fields = plan.creates[0]
            .fields
            .iter()
            .filter(|(f, _)| *f == Field::Category(CategoryField::SortOrder))
            .count();
        assert_eq!(sort_fields, 1);
    }

    #[test]
    fn unknown_anchor_appends() {
        let mut changes = ChangeSet::new();
        let key = create_category(&mut changes, "Lost", Placement::Before(saved("gone")));
        let listing = category_listing(&[("a", 10)]);

        let plan = ReconciliationPlanner::plan(&changes.snapshot(), &listing).unwrap();
        assert_eq!(position_of(&plan, &key), 10 + POSITION_GAP);
    }

    #[test]
    fn deleted_rows_are_not_neighbours() {
        let mut changes = ChangeSet::new();
        changes
            .mark_deletion(&saved("b"), EntityKind::Category)
            .unwrap();
        let key = create_category(&mut changes, "Tail", Placement::End);
        let listing = category_listing(&[("a", 10), ("b", 20)]);

        let plan = ReconciliationPlanner::plan(&changes.snapshot(), &listing).unwrap();
        assert_eq!(position_of(&plan, &key), 10 + POSITION_GAP);
    }

    #[test]
    fn items_are_positioned_within_their_transaction() {
        let mut changes = ChangeSet::new();
        let item = create_item(&mut changes, saved("t-1"), "acc-1");
        let mut listing = SortListing::new();
        listing.load(
            EntityKind::Item,
            vec![
                PositionRow {
                    id: RowId::from("i-1"),
                    sort_order: 100,
                    parent_id: Some(RowId::from("t-1")),
                },
                PositionRow {
                    id: RowId::from("i-9"),
                    sort_order: 9000,
                    parent_id: Some(RowId::from("t-2")),
                },
            ],
        );

        let plan = ReconciliationPlanner::plan(&changes.snapshot(), &listing).unwrap();
        let (scope, position) = plan.creates[0].position.clone().unwrap();
        assert_eq!(scope, Scope::Items(saved("t-1")));
        assert_eq!(position, 100 + POSITION_GAP);
        assert_eq!(position_of(&plan, &item), 1100);
    }

    // ===== Ordering =====

    #[test]
    fn plan_orders_parents_before_children() {
        let mut changes = ChangeSet::new();
        changes
            .mark_deletion(&saved("cat-old"), EntityKind::Category)
            .unwrap();
        changes
            .mark_deletion(&saved("i-old"), EntityKind::Item)
            .unwrap();
        let transaction = create_transaction(&mut changes);
        let item = create_item(&mut changes, transaction.clone().into(), "acc-1");
        let category = create_category(&mut changes, "New", Placement::End);
        changes
            .set_field(&saved("acc-1"), AccountField::Name, "Main", "Checking")
            .unwrap();

        let plan = ReconciliationPlanner::plan(&changes.snapshot(), &SortListing::new()).unwrap();

        let deletes: Vec<&str> = plan.deletes.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(deletes, vec!["i-old", "cat-old"]);
        let creates: Vec<&PendingId> = plan.creates.iter().map(|c| &c.key).collect();
        assert_eq!(creates, vec![&category, &transaction, &item]);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.len(), 6);
    }

    #[test]
    fn updates_carry_only_changed_fields() {
        let mut changes = ChangeSet::new();
        let key = saved("acc-1");
        changes
            .set_field(&key, AccountField::Name, "Main", "Checking")
            .unwrap();
        changes
            .set_field(&key, AccountField::OpeningBalance, Cents::new(0), Cents::new(0))
            .unwrap();

        let plan = ReconciliationPlanner::plan(&changes.snapshot(), &SortListing::new()).unwrap();
        let fields: Vec<Field> = plan.updates[0].fields.iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, vec![Field::Account(AccountField::Name)]);
    }

    // ===== Validation =====

    #[test]
    fn missing_required_fields_are_reported() {
        let mut changes = ChangeSet::new();
        let key = allocate_pending_id();
        changes
            .mark_creation(key.clone().into(), EntityKind::Transaction, vec![], Placement::End)
            .unwrap();

        let issues = ReconciliationPlanner::validate(&changes.snapshot());
        assert_eq!(issues.len(), 2);
        assert!(issues
            .iter()
            .all(|e| e.row() == Some(&RowKey::Pending(key.clone()))));
        assert!(ReconciliationPlanner::plan(&changes.snapshot(), &SortListing::new()).is_err());
    }

    #[test]
    fn reference_to_row_pending_deletion_is_invalid() {
        let mut changes = ChangeSet::new();
        changes
            .set_field(
                &saved("i-1"),
                ItemField::Category,
                RowId::from("cat-2"),
                RowId::from("cat-1"),
            )
            .unwrap();
        changes
            .mark_deletion(&saved("cat-2"), EntityKind::Category)
            .unwrap();

        let issues = ReconciliationPlanner::validate(&changes.snapshot());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row(), Some(&saved("i-1")));
    }

    #[test]
    fn reference_to_unknown_pending_row_is_invalid() {
        let mut changes = ChangeSet::new();
        changes
            .set_field(
                &saved("i-1"),
                ItemField::Transaction,
                allocate_pending_id(),
                RowId::from("t-1"),
            )
            .unwrap();

        let issues = ReconciliationPlanner::validate(&changes.snapshot());
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn unknown_account_type_is_invalid() {
        let mut changes = ChangeSet::new();
        changes
            .set_field(&saved("acc-1"), AccountField::AccountType, "piggy_bank", "cash")
            .unwrap();

        let issues = ReconciliationPlanner::validate(&changes.snapshot());
        assert_eq!(issues.len(), 1);
    }

    // ===== Listing =====

    #[test]
    fn listing_applies_commit_results() {
        let mut listing = category_listing(&[("a", 10), ("b", 20)]);
        let report = CommitReport {
            deleted: vec![RowId::from("a")],
            positions: vec![(Scope::Categories, RowId::from("c"), 15)],
            ..CommitReport::default()
        };
        listing.apply(&report);

        let ids: Vec<&str> = listing
            .rows(&Scope::Categories)
            .iter()
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "b"]);
    }
}
