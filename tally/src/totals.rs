//! Dashboard figures derived from committed rows.
//!
//! Amounts are signed from the account's point of view: money in is positive.
//! Items without a category are transfers and count toward neither income nor spending.

use std::collections::HashMap;
use tally_api::endpoints::{
    accounts::Account,
    tiles::{Tile, TileKind},
    transaction_items::TransactionItem,
    Cents, RowId,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerTotals {
    pub balances: HashMap<RowId, Cents>,
    pub category_totals: HashMap<RowId, Cents>,
    /// Sum of non-liability balances
    pub assets: Cents,
    /// Sum of liability balances, normally negative
    pub liabilities: Cents,
    pub income: Cents,
    /// Categorized outflows, as a positive amount
    pub spending: Cents,
}

impl LedgerTotals {
    pub fn compute(accounts: &[Account], items: &[TransactionItem]) -> Self {
        let mut balances: HashMap<RowId, Cents> = accounts
            .iter()
            .map(|a| (a.id.clone(), a.opening_balance))
            .collect();
        let mut category_totals: HashMap<RowId, Cents> = HashMap::new();
        let mut income = Cents::default();
        let mut spending = Cents::default();

        for item in items {
            *balances.entry(item.account_id.clone()).or_default() += item.amount;
            if let Some(category) = &item.category_id {
                *category_totals.entry(category.clone()).or_default() += item.amount;
                if item.amount.is_positive() {
                    income += item.amount;
                } else {
                    spending -= item.amount;
                }
            }
        }

        let (liabilities, assets): (Vec<&Account>, Vec<&Account>) = accounts
            .iter()
            .partition(|a| a.account_type.is_liability());
        let sum = |accounts: Vec<&Account>| -> Cents {
            accounts
                .iter()
                .filter_map(|a| balances.get(&a.id))
                .sum()
        };

        Self {
            assets: sum(assets),
            liabilities: sum(liabilities),
            balances,
            category_totals,
            income,
            spending,
        }
    }

    pub fn net_worth(&self) -> Cents {
        self.assets + self.liabilities
    }

    /// The figure a tile shows; `None` when the tile points at a missing row
    pub fn tile_value(&self, tile: &Tile) -> Option<Cents> {
        match tile.kind {
            TileKind::AccountBalance => self.balances.get(tile.account_id.as_ref()?).copied(),
            TileKind::CategoryTotal => Some(
                self.category_totals
                    .get(tile.category_id.as_ref()?)
                    .copied()
                    .unwrap_or_default(),
            ),
            TileKind::NetWorth => Some(self.net_worth()),
            TileKind::TotalIncome => Some(self.income),
            TileKind::TotalSpending => Some(self.spending),
        }
    }
}
