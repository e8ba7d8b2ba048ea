use crate::changes::EntityKind;
use crate::error::StoreError;
use tally_api::endpoints::{
    accounts::Accounts, categories::Categories, query::PositionRow,
    transaction_items::TransactionItems, transactions::Transactions, Delete, Insert, Record,
    RowId, RowPayload, Table, Update,
};
use tally_api::repositories::TableRepository;
use tally_api::{Client, Request};
use tally_auth::{AuthError, AuthState, Settings};

/// Row-level access to the remote store. One call per row; the store applies each
/// call atomically on its own.
#[allow(async_fn_in_trait)]
pub trait RowStore {
    /// Insert one row and return the id the store assigned
    async fn insert(&self, kind: EntityKind, row: RowPayload) -> Result<RowId, StoreError>;

    async fn update(
        &self,
        kind: EntityKind,
        id: &RowId,
        patch: RowPayload,
    ) -> Result<(), StoreError>;

    async fn delete(&self, kind: EntityKind, id: &RowId) -> Result<(), StoreError>;

    /// Committed positions of every row of an ordered kind
    async fn positions(&self, kind: EntityKind) -> Result<Vec<PositionRow>, StoreError>;
}

/// Who owns the rows being created
pub trait Identity {
    fn current_user_id(&self) -> Result<String, AuthError>;
}

impl Identity for AuthState {
    fn current_user_id(&self) -> Result<String, AuthError> {
        AuthState::current_user_id(self).map(str::to_string)
    }
}

/// `RowStore` over the backend's row gateway
pub struct ApiStore {
    client: Client,
    user_id: Option<String>,
}

impl ApiStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            user_id: None,
        }
    }

    /// Client authenticated as the signed-in user, reading only that user's rows
    pub fn connect(settings: &Settings, auth: &AuthState) -> Result<Self, AuthError> {
        let token = auth.access_token()?;
        let user_id = AuthState::current_user_id(auth)?.to_string();
        Ok(Self {
            client: Client::new(&settings.backend_url, &token),
            user_id: Some(user_id),
        })
    }

    fn scoped<T: Table>(&self, repository: TableRepository<T>) -> TableRepository<T> {
        match &self.user_id {
            Some(user_id) => repository.with_user(user_id.as_str()),
            None => repository,
        }
    }

    async fn insert_into<T: Table>(&self, row: RowPayload) -> Result<RowId, StoreError> {
        let rows = self.client.send(Insert::<T>::new(vec![row])).await?;
        rows.first()
            .map(|r| r.id().clone())
            .ok_or(StoreError::EmptyInsert)
    }

    async fn update_in<T: Table>(&self, id: &RowId, patch: RowPayload) -> Result<(), StoreError> {
        self.client.send(Update::<T>::by_id(id, patch)).await?;
        Ok(())
    }

    async fn delete_from<T: Table>(&self, id: &RowId) -> Result<(), StoreError> {
        self.client.send(Delete::<T>::by_id(id)).await?;
        Ok(())
    }
}

impl RowStore for ApiStore {
    async fn insert(&self, kind: EntityKind, row: RowPayload) -> Result<RowId, StoreError> {
        tracing::debug!("Inserting into {}", kind.table());
        match kind {
            EntityKind::Account => self.insert_into::<Accounts>(row).await,
            EntityKind::Category => self.insert_into::<Categories>(row).await,
            EntityKind::Transaction => self.insert_into::<Transactions>(row).await,
            EntityKind::Item => self.insert_into::<TransactionItems>(row).await,
        }
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &RowId,
        patch: RowPayload,
    ) -> Result<(), StoreError> {
        tracing::debug!("Updating {} {} ({} columns)", kind.table(), id, patch.len());
        match kind {
            EntityKind::Account => self.update_in::<Accounts>(id, patch).await,
            EntityKind::Category => self.update_in::<Categories>(id, patch).await,
            EntityKind::Transaction => self.update_in::<Transactions>(id, patch).await,
            EntityKind::Item => self.update_in::<TransactionItems>(id, patch).await,
        }
    }

    async fn delete(&self, kind: EntityKind, id: &RowId) -> Result<(), StoreError> {
        tracing::debug!("Deleting {} {}", kind.table(), id);
        match kind {
            EntityKind::Account => self.delete_from::<Accounts>(id).await,
            EntityKind::Category => self.delete_from::<Categories>(id).await,
            EntityKind::Transaction => self.delete_from::<Transactions>(id).await,
            EntityKind::Item => self.delete_from::<TransactionItems>(id).await,
        }
    }

    async fn positions(&self, kind: EntityKind) -> Result<Vec<PositionRow>, StoreError> {
        let rows = match kind {
            EntityKind::Account => {
                self.client
                    .send(self.scoped(Request::accounts()).positions())
                    .await?
            }
            EntityKind::Category => {
                self.client
                    .send(self.scoped(Request::categories()).positions())
                    .await?
            }
            EntityKind::Item => {
                self.client
                    .send(self.scoped(Request::items()).positions())
                    .await?
            }
            EntityKind::Transaction => Vec::new(),
        };
        Ok(rows)
    }
}
