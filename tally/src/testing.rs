use crate::changes::EntityKind;
use crate::error::StoreError;
use crate::store::{Identity, RowStore};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tally_api::endpoints::{query::PositionRow, RowId, RowPayload};
use tally_auth::AuthError;

/// A call received by `MockStore`
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Insert {
        kind: EntityKind,
        row: RowPayload,
    },
    Update {
        kind: EntityKind,
        id: RowId,
        patch: RowPayload,
    },
    Delete {
        kind: EntityKind,
        id: RowId,
    },
}

#[derive(Debug, Clone)]
enum FailOn {
    Insert(EntityKind),
    Update(RowId),
    Delete(RowId),
}

#[derive(Default)]
struct MockState {
    rows: BTreeMap<(EntityKind, RowId), RowPayload>,
    next_id: u64,
    calls: Vec<StoreCall>,
    failures: Vec<(FailOn, StoreError)>,
}

impl MockState {
    fn scripted(&self, call: &StoreCall) -> Option<StoreError> {
        self.failures.iter().find_map(|(on, error)| {
            let hit = match (on, call) {
                (FailOn::Insert(kind), StoreCall::Insert { kind: k, .. }) => kind == k,
                (FailOn::Update(id), StoreCall::Update { id: i, .. }) => id == i,
                (FailOn::Delete(id), StoreCall::Delete { id: i, .. }) => id == i,
                _ => false,
            };
            hit.then(|| error.clone())
        })
    }
}

/// In-memory row store for tests (no network)
///
/// Every call yields to the runtime once before it is applied, so work joined with a
/// commit runs while that commit is in flight.
#[derive(Default)]
pub struct MockStore {
    state: Mutex<MockState>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a saved row
    pub fn with_row(self, kind: EntityKind, id: &str, row: serde_json::Value) -> Self {
        {
            let mut state = self.lock();
            let mut payload = match row {
                serde_json::Value::Object(map) => map,
                _ => RowPayload::new(),
            };
            payload.insert("id".to_string(), serde_json::Value::from(id));
            state.rows.insert((kind, RowId::from(id)), payload);
        }
        self
    }

    pub fn fail_insert(&self, kind: EntityKind, error: StoreError) {
        self.lock().failures.push((FailOn::Insert(kind), error));
    }

    pub fn fail_update(&self, id: &str, error: StoreError) {
        self.lock()
            .failures
            .push((FailOn::Update(RowId::from(id)), error));
    }

    pub fn fail_delete(&self, id: &str, error: StoreError) {
        self.lock()
            .failures
            .push((FailOn::Delete(RowId::from(id)), error));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn row(&self, kind: EntityKind, id: &RowId) -> Option<RowPayload> {
        self.lock().rows.get(&(kind, id.clone())).cloned()
    }

    pub fn rows(&self, kind: EntityKind) -> Vec<(RowId, RowPayload)> {
        self.lock()
            .rows
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, id), row)| (id.clone(), row.clone()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock store lock poisoned")
    }

    fn record(&self, call: StoreCall) -> Result<(), StoreError> {
        let mut state = self.lock();
        let failure = state.scripted(&call);
        state.calls.push(call);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl RowStore for MockStore {
    async fn insert(&self, kind: EntityKind, row: RowPayload) -> Result<RowId, StoreError> {
        tokio::task::yield_now().await;
        self.record(StoreCall::Insert {
            kind,
            row: row.clone(),
        })?;

        let mut state = self.lock();
        state.next_id += 1;
        let id = RowId::new(format!("{}-{}", kind, state.next_id));
        let mut row = row;
        row.insert("id".to_string(), serde_json::Value::from(id.as_str()));
        state.rows.insert((kind, id.clone()), row);
        Ok(id)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &RowId,
        patch: RowPayload,
    ) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.record(StoreCall::Update {
            kind,
            id: id.clone(),
            patch: patch.clone(),
        })?;

        let mut state = self.lock();
        let row = state.rows.entry((kind, id.clone())).or_insert_with(|| {
            let mut row = RowPayload::new();
            row.insert("id".to_string(), serde_json::Value::from(id.as_str()));
            row
        });
        row.extend(patch);
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &RowId) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.record(StoreCall::Delete {
            kind,
            id: id.clone(),
        })?;

        self.lock().rows.remove(&(kind, id.clone()));
        Ok(())
    }

    async fn positions(&self, kind: EntityKind) -> Result<Vec<PositionRow>, StoreError> {
        tokio::task::yield_now().await;
        let rows = self
            .rows(kind)
            .into_iter()
            .filter_map(|(id, row)| {
                let sort_order = row.get("sort_order")?.as_i64()?;
                let parent_id = row
                    .get("transaction_id")
                    .and_then(|v| v.as_str())
                    .map(RowId::from);
                Some(PositionRow {
                    id,
                    sort_order,
                    parent_id,
                })
            })
            .collect();
        Ok(rows)
    }
}

/// Fixed identity for tests
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
        }
    }

    pub fn signed_out() -> Self {
        Self { user_id: None }
    }
}

impl Identity for StaticIdentity {
    fn current_user_id(&self) -> Result<String, AuthError> {
        self.user_id.clone().ok_or(AuthError::NoSession)
    }
}
