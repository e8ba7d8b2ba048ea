use crate::endpoints::{
    Delete, Direction, Insert, QueryParams, RowId, RowPayload, Select, Table, Update, Upsert,
    accounts::Accounts, categories::Categories, query::PositionRow, tiles::Tiles,
    transaction_items::TransactionItems, transactions::Transactions,
};
use chrono::NaiveDate;
use std::marker::PhantomData;

pub type AccountRepository = TableRepository<Accounts>;
pub type CategoryRepository = TableRepository<Categories>;
pub type TransactionRepository = TableRepository<Transactions>;
pub type ItemRepository = TableRepository<TransactionItems>;
pub type TileRepository = TableRepository<Tiles>;

/// Builds requests against one table, optionally scoped to a single owner
#[derive(Debug, Clone)]
pub struct TableRepository<T> {
    user_id: Option<String>,
    table: PhantomData<fn() -> T>,
}

impl<T: Table> Default for TableRepository<T> {
    fn default() -> Self {
        Self {
            user_id: None,
            table: PhantomData,
        }
    }
}

impl<T: Table> TableRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    fn scoped(&self) -> QueryParams {
        match &self.user_id {
            Some(user_id) => QueryParams::new().eq("user_id", user_id),
            None => QueryParams::new(),
        }
    }

    pub fn list(&self) -> Select<T, T::Row> {
        Select::with_params(self.scoped())
    }

    pub fn get(&self, id: &RowId) -> Select<T, T::Row> {
        Select::with_params(self.scoped().eq("id", id)).limit(1)
    }

    pub fn insert(&self, rows: Vec<RowPayload>) -> Insert<T> {
        Insert::new(rows)
    }

    pub fn upsert(&self, rows: Vec<RowPayload>) -> Upsert<T> {
        Upsert::new(rows)
    }

    pub fn update(&self, id: &RowId, patch: RowPayload) -> Update<T> {
        Update::by_id(id, patch)
    }

    pub fn delete(&self, id: &RowId) -> Delete<T> {
        Delete::by_id(id)
    }
}

impl AccountRepository {
    pub fn ordered(&self) -> Select<Accounts, <Accounts as Table>::Row> {
        self.list().order("sort_order", Direction::Ascending)
    }

    pub fn positions(&self) -> Select<Accounts, PositionRow> {
        Select::with_params(self.scoped())
            .columns(&["id", "sort_order"])
            .order("sort_order", Direction::Ascending)
    }
}

impl CategoryRepository {
    pub fn ordered(&self) -> Select<Categories, <Categories as Table>::Row> {
        self.list().order("sort_order", Direction::Ascending)
    }

    pub fn positions(&self) -> Select<Categories, PositionRow> {
        Select::with_params(self.scoped())
            .columns(&["id", "sort_order"])
            .order("sort_order", Direction::Ascending)
    }
}

impl TransactionRepository {
    /// Transactions dated within `from..=to`, newest first
    pub fn between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Select<Transactions, <Transactions as Table>::Row> {
        Select::with_params(self.scoped().gte("date", from).lte("date", to))
            .order("date", Direction::Descending)
    }
}

impl ItemRepository {
    pub fn for_transaction(
        &self,
        transaction_id: &RowId,
    ) -> Select<TransactionItems, <TransactionItems as Table>::Row> {
        Select::with_params(self.scoped().eq("transaction_id", transaction_id))
            .order("sort_order", Direction::Ascending)
    }

    pub fn positions(&self) -> Select<TransactionItems, PositionRow> {
        Select::with_params(self.scoped())
            .columns(&["id", "sort_order", "transaction_id"])
            .order("transaction_id", Direction::Ascending)
            .order("sort_order", Direction::Ascending)
    }
}

impl TileRepository {
    pub fn layout(&self) -> Select<Tiles, <Tiles as Table>::Row> {
        self.list().order("position", Direction::Ascending)
    }
}
