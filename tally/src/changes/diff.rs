//! Field-level diffing. A field has a pending value only while that value differs
//! from the committed one.

use super::{ChangeSet, EntityKind, Field, FieldValue, PendingValue, RecordState, RowChangeRecord};
use crate::error::LedgerError;
use crate::identity::RowKey;

pub(super) fn check_field(
    key: &RowKey,
    kind: EntityKind,
    field: Field,
    value: &FieldValue,
) -> Result<(), LedgerError> {
    if field.kind() != kind {
        return Err(LedgerError::validation(
            key,
            format!("{} is not a field of a {} row", field, kind),
        ));
    }
    if !value.fits(field.value_type()) {
        return Err(LedgerError::validation(
            key,
            format!("{} cannot hold {:?}", field, value),
        ));
    }
    Ok(())
}

impl ChangeSet {
    /// Record the value a field holds after an edit, against the value committed in the store.
    ///
    /// Setting a field back to its baseline removes its pending slot, and the row's
    /// record once nothing else is pending. On rows pending creation the baseline is
    /// always `Empty`. Repeating a call leaves the change set as it was.
    pub fn set_field(
        &mut self,
        key: &RowKey,
        field: impl Into<Field>,
        value: impl Into<FieldValue>,
        baseline: impl Into<FieldValue>,
    ) -> Result<(), LedgerError> {
        let field = field.into();
        let value = value.into().normalized();
        let baseline = baseline.into().normalized();

        let Some(record) = self.records.get(key) else {
            if key.is_pending() {
                return Err(LedgerError::validation(
                    key,
                    "row must be marked for creation before it is edited",
                ));
            }
            check_field(key, field.kind(), field, &value)?;
            check_field(key, field.kind(), field, &baseline)?;
            if value == baseline {
                return Ok(());
            }

            self.insert_record(key.clone(), field.kind(), RecordState::Edit);
            if let Some(slot) = self
                .records
                .get_mut(key)
                .and_then(|r| r.change.slot_mut(field))
            {
                *slot = Some(PendingValue { value, baseline });
            }
            return Ok(());
        };

        let kind = record.kind();
        check_field(key, kind, field, &value)?;
        let baseline = match record.state {
            RecordState::Delete => {
                return Err(LedgerError::validation(key, "row is pending deletion"))
            }
            RecordState::Create { .. } => FieldValue::Empty,
            RecordState::Edit => {
                check_field(key, kind, field, &baseline)?;
                baseline
            }
        };

        let desired = (value != baseline).then_some(PendingValue { value, baseline });
        if record.change.slot(field) == desired.as_ref() {
            return Ok(());
        }

        let revision = self.next_revision();
        if let Some(record) = self.records.get_mut(key) {
            if let Some(slot) = record.change.slot_mut(field) {
                *slot = desired;
            }
            record.revision = revision;
            if record.is_noop() {
                self.records.remove(key);
            }
        }
        Ok(())
    }

    /// The uncommitted value of `field`, if it differs from the store
    pub fn pending_value(&self, key: &RowKey, field: impl Into<Field>) -> Option<&FieldValue> {
        self.records.get(key)?.value(field)
    }
}

/// Turn a creation that reached the store into edits of the saved row, keeping only
/// what still differs from the values sent.
pub(super) fn rebase_creation(
    record: &mut RowChangeRecord,
    snapshot: Option<&RowChangeRecord>,
    committed: &[(Field, FieldValue)],
) {
    for field in record.kind().fields() {
        let sent_by_user = snapshot.is_some_and(|s| s.change.slot(field).is_some());
        let desired = match record.change.slot(field) {
            Some(slot) => slot.value.clone(),
            None if sent_by_user => FieldValue::Empty,
            None => continue,
        };
        let stored = committed
            .iter()
            .find(|(f, _)| *f == field)
            .map_or(FieldValue::Empty, |(_, v)| v.clone());

        if let Some(slot) = record.change.slot_mut(field) {
            *slot = (desired != stored).then_some(PendingValue {
                value: desired,
                baseline: stored,
            });
        }
    }
}

/// Re-diff an edited row against the values an update just stored
pub(super) fn rebase_update(
    record: &mut RowChangeRecord,
    snapshot: Option<&RowChangeRecord>,
    committed: &[(Field, PendingValue)],
) {
    for (field, sent) in committed {
        let was_pending = snapshot.is_some_and(|s| s.change.slot(*field).is_some());
        let Some(slot) = record.change.slot_mut(*field) else {
            continue;
        };
        let desired = match slot.as_ref() {
            Some(current) => current.value.clone(),
            // reverted while the update was in flight
            None if was_pending => sent.baseline.clone(),
            None => continue,
        };
        *slot = (desired != sent.value).then(|| PendingValue {
            value: desired,
            baseline: sent.value.clone(),
        });
    }
}
