use super::{RowId, Table};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::Display;
use std::marker::PhantomData;
use tower_api_client::{EmptyResponse, Method, Request, RequestData};

/// Column name to JSON value, as written to the gateway
pub type RowPayload = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        }
    }
}

/// Gateway query string: column filters, projection and ordering.
///
/// Filters use the `column=op.value` convention (`id=eq.42`, `category_id=is.null`,
/// `id=in.("a","b")`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.0.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Display) -> Self {
        self.0.push((column.to_string(), format!("gte.{}", value)));
        self
    }

    pub fn lte(mut self, column: &str, value: impl Display) -> Self {
        self.0.push((column.to_string(), format!("lte.{}", value)));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.0.push((column.to_string(), "is.null".to_string()));
        self
    }

    pub fn one_of<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        let quoted: Vec<String> = values
            .into_iter()
            .map(|v| format!("\"{}\"", v.to_string().replace('"', "\\\"")))
            .collect();
        self.0
            .push((column.to_string(), format!("in.({})", quoted.join(","))));
        self
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.0.retain(|(key, _)| key != "select");
        self.0.push(("select".to_string(), columns.join(",")));
        self
    }

    /// Add a sort key; repeated calls sort by each key in turn
    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        let key = format!("{}.{}", column, direction.as_str());
        match self.0.iter_mut().find(|(k, _)| k == "order") {
            Some((_, existing)) => {
                existing.push(',');
                existing.push_str(&key);
            }
            None => self.0.push(("order".to_string(), key)),
        }
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.0.retain(|(key, _)| key != "limit");
        self.0.push(("limit".to_string(), limit.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Percent-encoded `key=value&...` form, for requests that carry a JSON body and
    /// therefore put their filter in the endpoint
    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Minimal projection used to read ordering information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRow {
    pub id: RowId,
    pub sort_order: i64,
    #[serde(default, alias = "transaction_id")]
    pub parent_id: Option<RowId>,
}

// Requests

#[derive(Debug, Clone)]
pub struct Select<T, R> {
    params: QueryParams,
    table: PhantomData<fn() -> (T, R)>,
}

impl<T: Table, R> Select<T, R> {
    pub fn new() -> Self {
        Self {
            params: QueryParams::new(),
            table: PhantomData,
        }
    }

    pub fn with_params(params: QueryParams) -> Self {
        Self {
            params,
            table: PhantomData,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.params = self.params.columns(columns);
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params = self.params.eq(column, value);
        self
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.params = self.params.order(column, direction);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.params = self.params.limit(limit);
        self
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }
}

impl<T: Table, R> Default for Select<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> Request for Select<T, R>
where
    T: Table,
    R: DeserializeOwned + Send + 'static,
{
    type Data = QueryParams;
    type Response = Vec<R>;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/{}", T::NAME).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        if self.params.is_empty() {
            RequestData::Empty
        } else {
            RequestData::Query(&self.params)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Insert<T> {
    rows: Vec<RowPayload>,
    table: PhantomData<fn() -> T>,
}

impl<T: Table> Insert<T> {
    pub fn new(rows: Vec<RowPayload>) -> Self {
        Self {
            rows,
            table: PhantomData,
        }
    }

    pub fn rows(&self) -> &[RowPayload] {
        &self.rows
    }
}

impl<T: Table> Request for Insert<T> {
    type Data = Vec<RowPayload>;
    type Response = Vec<T::Row>;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/{}", T::NAME).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(&self.rows)
    }
}

#[derive(Debug, Clone)]
pub struct Upsert<T> {
    rows: Vec<RowPayload>,
    on_conflict: String,
    table: PhantomData<fn() -> T>,
}

impl<T: Table> Upsert<T> {
    pub fn new(rows: Vec<RowPayload>) -> Self {
        Self {
            rows,
            on_conflict: "id".to_string(),
            table: PhantomData,
        }
    }

    pub fn on_conflict(mut self, column: impl Into<String>) -> Self {
        self.on_conflict = column.into();
        self
    }
}

impl<T: Table> Request for Upsert<T> {
    type Data = Vec<RowPayload>;
    type Response = Vec<T::Row>;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        format!(
            "/{}?on_conflict={}",
            T::NAME,
            urlencoding::encode(&self.on_conflict)
        )
        .into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(&self.rows)
    }
}

#[derive(Debug, Clone)]
pub struct Update<T> {
    filter: QueryParams,
    patch: RowPayload,
    table: PhantomData<fn() -> T>,
}

impl<T: Table> Update<T> {
    pub fn by_id(id: &RowId, patch: RowPayload) -> Self {
        Self {
            filter: QueryParams::new().eq("id", id),
            patch,
            table: PhantomData,
        }
    }

    pub fn patch(&self) -> &RowPayload {
        &self.patch
    }
}

impl<T: Table> Request for Update<T> {
    type Data = RowPayload;
    type Response = EmptyResponse;
    const METHOD: Method = Method::PATCH;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/{}?{}", T::NAME, self.filter.to_query_string()).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(&self.patch)
    }
}

#[derive(Debug, Clone)]
pub struct Delete<T> {
    filter: QueryParams,
    table: PhantomData<fn() -> T>,
}

impl<T: Table> Delete<T> {
    pub fn by_id(id: &RowId) -> Self {
        Self::matching(QueryParams::new().eq("id", id))
    }

    fn matching(filter: QueryParams) -> Self {
        Self {
            filter,
            table: PhantomData,
        }
    }
}

impl<T: Table> Request for Delete<T> {
    type Data = QueryParams;
    type Response = EmptyResponse;
    const METHOD: Method = Method::DELETE;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/{}", T::NAME).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Query(&self.filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::accounts::Accounts;
    use crate::endpoints::transaction_items::TransactionItems;

    #[test]
    fn query_params_build_gateway_filters() {
        let params = QueryParams::new()
            .columns(&["id", "sort_order"])
            .eq("user_id", "u1")
            .is_null("category_id")
            .order("sort_order", Direction::Ascending)
            .order("id", Direction::Descending);

        assert_eq!(
            params.pairs(),
            &[
                ("select".to_string(), "id,sort_order".to_string()),
                ("user_id".to_string(), "eq.u1".to_string()),
                ("category_id".to_string(), "is.null".to_string()),
                ("order".to_string(), "sort_order.asc,id.desc".to_string()),
            ]
        );
    }

    #[test]
    fn one_of_quotes_values() {
        let params = QueryParams::new().one_of("id", ["a", "b,c"]);
        assert_eq!(params.pairs()[0].1, "in.(\"a\",\"b,c\")");
    }

    #[test]
    fn query_string_is_percent_encoded() {
        let params = QueryParams::new().eq("id", "a b/c");
        assert_eq!(params.to_query_string(), "id=eq.a%20b%2Fc");
    }

    #[test]
    fn update_puts_filter_in_endpoint() {
        let mut patch = RowPayload::new();
        patch.insert("name".to_string(), serde_json::json!("Savings"));
        let req = Update::<Accounts>::by_id(&RowId::from("acc-1"), patch);
        assert_eq!(req.endpoint(), "/accounts?id=eq.acc-1");
    }

    #[test]
    fn delete_always_filters_by_id() {
        let req = Delete::<Accounts>::by_id(&RowId::from("acc 1"));
        match req.data() {
            RequestData::Query(filter) => {
                assert_eq!(filter.pairs(), &[("id".to_string(), "eq.acc 1".to_string())]);
                assert_eq!(filter.to_query_string(), "id=eq.acc%201");
            }
            _ => panic!("delete without a filter"),
        }
    }

    #[test]
    fn upsert_endpoint_names_conflict_column() {
        let req = Upsert::<TransactionItems>::new(vec![]).on_conflict("id");
        assert_eq!(req.endpoint(), "/transaction_items?on_conflict=id");
    }

    #[test]
    fn position_row_reads_item_parent() {
        let row: PositionRow =
            serde_json::from_str(r#"{"id":"i1","sort_order":20,"transaction_id":"t9"}"#)
                .unwrap();
        assert_eq!(row.parent_id, Some(RowId::from("t9")));

        let row: PositionRow = serde_json::from_str(r#"{"id":"a1","sort_order":10}"#).unwrap();
        assert_eq!(row.parent_id, None);
    }
}
