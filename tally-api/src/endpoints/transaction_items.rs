use super::{Cents, Record, RowId, Table};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct TransactionItems;

impl Table for TransactionItems {
    const NAME: &'static str = "transaction_items";
    type Row = TransactionItem;
}

/// One line of a transaction: an amount moved in or out of an account, optionally
/// tagged with a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub id: RowId,
    pub user_id: String,
    pub transaction_id: RowId,
    pub account_id: RowId,
    pub category_id: Option<RowId>,
    pub amount: Cents,
    pub memo: Option<String>,
    pub sort_order: i64,
}

impl Record for TransactionItem {
    fn id(&self) -> &RowId {
        &self.id
    }
}
