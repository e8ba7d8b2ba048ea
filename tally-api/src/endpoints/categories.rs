use super::{Record, RowId, Table};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct Categories;

impl Table for Categories {
    const NAME: &'static str = "categories";
    type Row = Category;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: RowId,
    pub user_id: String,
    pub name: String,
    /// Display colour as `#rrggbb`
    pub color: Option<String>,
    pub sort_order: i64,
}

impl Record for Category {
    fn id(&self) -> &RowId {
        &self.id
    }
}
