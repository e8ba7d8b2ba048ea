use crate::changes::{EntityKind, Field, FieldValue, Placement};
use crate::identity::RowKey;

/// Edits raised by the grid as the user works
#[derive(Debug, Clone, PartialEq)]
pub enum EditEvent {
    /// A cell lost focus holding `value`; `baseline` is what the store last returned
    FieldBlur {
        row: RowKey,
        field: Field,
        value: FieldValue,
        baseline: FieldValue,
    },
    CreateRow {
        kind: EntityKind,
        fields: Vec<(Field, FieldValue)>,
        placement: Placement,
    },
    DeleteRow {
        row: RowKey,
        kind: EntityKind,
    },
    /// Revert one row
    Discard {
        row: RowKey,
    },
    /// Revert the most recently edited row
    UndoLast,
}

impl EditEvent {
    pub fn blur(
        row: RowKey,
        field: impl Into<Field>,
        value: impl Into<FieldValue>,
        baseline: impl Into<FieldValue>,
    ) -> Self {
        EditEvent::FieldBlur {
            row,
            field: field.into(),
            value: value.into(),
            baseline: baseline.into(),
        }
    }
}
