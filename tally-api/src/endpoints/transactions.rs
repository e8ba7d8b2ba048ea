use super::{Record, RowId, Table};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct Transactions;

impl Table for Transactions {
    const NAME: &'static str = "transactions";
    type Row = Transaction;
}

/// Transaction header; amounts live on its items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: RowId,
    pub user_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub memo: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Transaction {
    fn id(&self) -> &RowId {
        &self.id
    }
}

impl PartialOrd for Transaction {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Newest first, then by id for a stable order within a day
impl Ord for Transaction {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.date.cmp(&self.date).then(self.id.cmp(&other.id))
    }
}
