use super::{Record, RowId, Table};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct Tiles;

impl Table for Tiles {
    const NAME: &'static str = "tiles";
    type Row = Tile;
}

/// A dashboard tile. `account_id` / `category_id` are set for the kinds that need them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: RowId,
    pub user_id: String,
    pub kind: TileKind,
    pub position: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub account_id: Option<RowId>,
    #[serde(default)]
    pub category_id: Option<RowId>,
}

impl Record for Tile {
    fn id(&self) -> &RowId {
        &self.id
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    AccountBalance,
    CategoryTotal,
    NetWorth,
    TotalIncome,
    TotalSpending,
}

impl TileKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AccountBalance => "Account balance",
            Self::CategoryTotal => "Category total",
            Self::NetWorth => "Net worth",
            Self::TotalIncome => "Income",
            Self::TotalSpending => "Spending",
        }
    }
}
