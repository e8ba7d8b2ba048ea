use crate::identity::{PendingId, RowKey};
use crate::macros::entity_change;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tally_api::endpoints::{
    accounts::Accounts, categories::Categories, transaction_items::TransactionItems,
    transactions::Transactions, Cents, RowId, Table,
};

/// The editable tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    Category,
    Transaction,
    Item,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Account,
        EntityKind::Category,
        EntityKind::Transaction,
        EntityKind::Item,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Self::Account => Accounts::NAME,
            Self::Category => Categories::NAME,
            Self::Transaction => Transactions::NAME,
            Self::Item => TransactionItems::NAME,
        }
    }

    /// Parents rank below their children: creates run in ascending rank, deletes descending
    pub fn rank(&self) -> u8 {
        match self {
            Self::Account => 0,
            Self::Category => 1,
            Self::Transaction => 2,
            Self::Item => 3,
        }
    }

    /// Field holding the row's position among its siblings, for ordered kinds
    pub fn sort_field(&self) -> Option<Field> {
        match self {
            Self::Account => Some(Field::Account(AccountField::SortOrder)),
            Self::Category => Some(Field::Category(CategoryField::SortOrder)),
            Self::Transaction => None,
            Self::Item => Some(Field::Item(ItemField::SortOrder)),
        }
    }

    pub fn fields(&self) -> Vec<Field> {
        match self {
            Self::Account => AccountField::ALL.iter().map(|f| Field::Account(*f)).collect(),
            Self::Category => CategoryField::ALL
                .iter()
                .map(|f| Field::Category(*f))
                .collect(),
            Self::Transaction => TransactionField::ALL
                .iter()
                .map(|f| Field::Transaction(*f))
                .collect(),
            Self::Item => ItemField::ALL.iter().map(|f| Field::Item(*f)).collect(),
        }
    }

    pub fn required_fields(&self) -> Vec<Field> {
        self.fields().into_iter().filter(Field::is_required).collect()
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Account => "account",
            Self::Category => "category",
            Self::Transaction => "transaction",
            Self::Item => "item",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Text,
    Amount,
    Integer,
    Date,
    Flag,
    Reference,
}

/// A cell value as edited in the UI
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Empty,
    Text(String),
    Amount(Cents),
    Integer(i64),
    Date(NaiveDate),
    Flag(bool),
    Ref(RowKey),
}

impl FieldValue {
    /// Trailing whitespace is not a change; text that trims to nothing is `Empty`
    pub fn normalized(self) -> Self {
        match self {
            FieldValue::Text(text) => {
                let trimmed = text.trim_end();
                if trimmed.is_empty() {
                    FieldValue::Empty
                } else if trimmed.len() == text.len() {
                    FieldValue::Text(text)
                } else {
                    FieldValue::Text(trimmed.to_string())
                }
            }
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    /// `Empty` fits every type
    pub fn fits(&self, ty: ValueType) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(_) => ty == ValueType::Text,
            FieldValue::Amount(_) => ty == ValueType::Amount,
            FieldValue::Integer(_) => ty == ValueType::Integer,
            FieldValue::Date(_) => ty == ValueType::Date,
            FieldValue::Flag(_) => ty == ValueType::Flag,
            FieldValue::Ref(_) => ty == ValueType::Reference,
        }
    }

    pub fn reference(&self) -> Option<&RowKey> {
        match self {
            FieldValue::Ref(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Point references at `pending` to the row it became
    pub fn resolve(&mut self, pending: &PendingId, id: &RowId) {
        if let FieldValue::Ref(RowKey::Pending(p)) = self {
            if p == pending {
                *self = FieldValue::Ref(RowKey::Persisted(id.clone()));
            }
        }
    }

    /// Wire form; `None` while the value still points at an unsaved row
    pub fn to_json(&self) -> Option<serde_json::Value> {
        let value = match self {
            FieldValue::Empty => serde_json::Value::Null,
            FieldValue::Text(text) => serde_json::Value::from(text.as_str()),
            FieldValue::Amount(cents) => serde_json::Value::from(cents.inner()),
            FieldValue::Integer(n) => serde_json::Value::from(*n),
            FieldValue::Date(date) => serde_json::Value::from(date.format("%Y-%m-%d").to_string()),
            FieldValue::Flag(flag) => serde_json::Value::from(*flag),
            FieldValue::Ref(RowKey::Persisted(id)) => serde_json::Value::from(id.as_str()),
            FieldValue::Ref(RowKey::Pending(_)) => return None,
        };
        Some(value)
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Empty => f.write_str("(empty)"),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Amount(cents) => write!(f, "{}", cents),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Date(date) => write!(f, "{}", date),
            FieldValue::Flag(flag) => write!(f, "{}", flag),
            FieldValue::Ref(key) => write!(f, "{}", key),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<Cents> for FieldValue {
    fn from(cents: Cents) -> Self {
        FieldValue::Amount(cents)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(date: NaiveDate) -> Self {
        FieldValue::Date(date)
    }
}

impl From<bool> for FieldValue {
    fn from(flag: bool) -> Self {
        FieldValue::Flag(flag)
    }
}

impl From<RowKey> for FieldValue {
    fn from(key: RowKey) -> Self {
        FieldValue::Ref(key)
    }
}

impl From<RowId> for FieldValue {
    fn from(id: RowId) -> Self {
        FieldValue::Ref(RowKey::Persisted(id))
    }
}

impl From<PendingId> for FieldValue {
    fn from(id: PendingId) -> Self {
        FieldValue::Ref(RowKey::Pending(id))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Empty, Into::into)
    }
}

/// A field's new value and the committed value it replaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingValue {
    pub value: FieldValue,
    pub baseline: FieldValue,
}

impl PendingValue {
    pub fn resolve(&mut self, pending: &PendingId, id: &RowId) {
        self.value.resolve(pending, id);
        self.baseline.resolve(pending, id);
    }
}

entity_change! {
    AccountChange, AccountField {
        Name => name: "name", Text, true;
        AccountType => account_type: "account_type", Text, true;
        OpeningBalance => opening_balance: "opening_balance", Amount, false;
        SortOrder => sort_order: "sort_order", Integer, false;
    }
}

entity_change! {
    CategoryChange, CategoryField {
        Name => name: "name", Text, true;
        Color => color: "color", Text, false;
        SortOrder => sort_order: "sort_order", Integer, false;
    }
}

entity_change! {
    TransactionChange, TransactionField {
        Date => date: "date", Date, true;
        Description => description: "description", Text, true;
        Memo => memo: "memo", Text, false;
    }
}

entity_change! {
    ItemChange, ItemField {
        Transaction => transaction: "transaction_id", Reference, true;
        Account => account: "account_id", Reference, true;
        Category => category: "category_id", Reference, false;
        Amount => amount: "amount", Amount, true;
        Memo => memo: "memo", Text, false;
        SortOrder => sort_order: "sort_order", Integer, false;
    }
}

/// A field of any editable kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum Field {
    Account(AccountField),
    Category(CategoryField),
    Transaction(TransactionField),
    Item(ItemField),
}

impl Field {
    pub fn kind(&self) -> EntityKind {
        match self {
            Field::Account(_) => EntityKind::Account,
            Field::Category(_) => EntityKind::Category,
            Field::Transaction(_) => EntityKind::Transaction,
            Field::Item(_) => EntityKind::Item,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Field::Account(f) => f.column(),
            Field::Category(f) => f.column(),
            Field::Transaction(f) => f.column(),
            Field::Item(f) => f.column(),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Field::Account(f) => f.value_type(),
            Field::Category(f) => f.value_type(),
            Field::Transaction(f) => f.value_type(),
            Field::Item(f) => f.value_type(),
        }
    }

    pub fn is_required(&self) -> bool {
        match self {
            Field::Account(f) => f.is_required(),
            Field::Category(f) => f.is_required(),
            Field::Transaction(f) => f.is_required(),
            Field::Item(f) => f.is_required(),
        }
    }

    /// Kind of row a reference field points at
    pub fn target(&self) -> Option<EntityKind> {
        match self {
            Field::Item(ItemField::Transaction) => Some(EntityKind::Transaction),
            Field::Item(ItemField::Account) => Some(EntityKind::Account),
            Field::Item(ItemField::Category) => Some(EntityKind::Category),
            _ => None,
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.kind(), self.column())
    }
}

impl From<AccountField> for Field {
    fn from(field: AccountField) -> Self {
        Field::Account(field)
    }
}

impl From<CategoryField> for Field {
    fn from(field: CategoryField) -> Self {
        Field::Category(field)
    }
}

impl From<TransactionField> for Field {
    fn from(field: TransactionField) -> Self {
        Field::Transaction(field)
    }
}

impl From<ItemField> for Field {
    fn from(field: ItemField) -> Self {
        Field::Item(field)
    }
}

/// Pending field slots of one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowChange {
    Account(AccountChange),
    Category(CategoryChange),
    Transaction(TransactionChange),
    Item(ItemChange),
}

impl RowChange {
    pub fn empty(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Account => RowChange::Account(AccountChange::default()),
            EntityKind::Category => RowChange::Category(CategoryChange::default()),
            EntityKind::Transaction => RowChange::Transaction(TransactionChange::default()),
            EntityKind::Item => RowChange::Item(ItemChange::default()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            RowChange::Account(_) => EntityKind::Account,
            RowChange::Category(_) => EntityKind::Category,
            RowChange::Transaction(_) => EntityKind::Transaction,
            RowChange::Item(_) => EntityKind::Item,
        }
    }

    /// `None` when the slot is unset or `field` belongs to another kind
    pub fn slot(&self, field: Field) -> Option<&PendingValue> {
        match (self, field) {
            (RowChange::Account(c), Field::Account(f)) => c.slot(f),
            (RowChange::Category(c), Field::Category(f)) => c.slot(f),
            (RowChange::Transaction(c), Field::Transaction(f)) => c.slot(f),
            (RowChange::Item(c), Field::Item(f)) => c.slot(f),
            _ => None,
        }
    }

    /// `None` when `field` belongs to another kind
    pub fn slot_mut(&mut self, field: Field) -> Option<&mut Option<PendingValue>> {
        match (self, field) {
            (RowChange::Account(c), Field::Account(f)) => Some(c.slot_mut(f)),
            (RowChange::Category(c), Field::Category(f)) => Some(c.slot_mut(f)),
            (RowChange::Transaction(c), Field::Transaction(f)) => Some(c.slot_mut(f)),
            (RowChange::Item(c), Field::Item(f)) => Some(c.slot_mut(f)),
            _ => None,
        }
    }

    pub fn fields(&self) -> Vec<(Field, &PendingValue)> {
        match self {
            RowChange::Account(c) => c.fields().into_iter().map(|(f, v)| (f.into(), v)).collect(),
            RowChange::Category(c) => c.fields().into_iter().map(|(f, v)| (f.into(), v)).collect(),
            RowChange::Transaction(c) => {
                c.fields().into_iter().map(|(f, v)| (f.into(), v)).collect()
            }
            RowChange::Item(c) => c.fields().into_iter().map(|(f, v)| (f.into(), v)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RowChange::Account(c) => c.is_empty(),
            RowChange::Category(c) => c.is_empty(),
            RowChange::Transaction(c) => c.is_empty(),
            RowChange::Item(c) => c.is_empty(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            RowChange::Account(c) => c.clear(),
            RowChange::Category(c) => c.clear(),
            RowChange::Transaction(c) => c.clear(),
            RowChange::Item(c) => c.clear(),
        }
    }

    /// Apply `f` to every set slot
    pub fn for_each_slot(&mut self, mut f: impl FnMut(&mut PendingValue)) {
        for field in self.kind().fields() {
            if let Some(Some(slot)) = self.slot_mut(field) {
                f(slot);
            }
        }
    }
}
