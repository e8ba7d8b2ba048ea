pub mod endpoints;
mod error;
pub mod repositories;

pub use crate::error::{ErrorDetail, StoreApiError};
use repositories::*;
use secrecy::{ExposeSecret, SecretString};
use tower_api_client::{Client as ApiClient, Request as ApiRequest};

/// Path of the row gateway below the backend's base URL.
const REST_PATH: &str = "/rest/v1";

pub struct Client {
    inner: ApiClient,
}

impl Client {
    pub fn new(backend_url: &str, access_token: &SecretString) -> Self {
        let base_url = format!("{}{}", backend_url.trim_end_matches('/'), REST_PATH);
        Self {
            inner: ApiClient::new(&base_url).bearer_auth(access_token.expose_secret()),
        }
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, StoreApiError>
    where
        R: ApiRequest,
    {
        self.inner.send(request).await.map_err(From::from)
    }
}

pub struct Request;

impl Request {
    pub fn accounts() -> AccountRepository {
        AccountRepository::new()
    }

    pub fn categories() -> CategoryRepository {
        CategoryRepository::new()
    }

    pub fn transactions() -> TransactionRepository {
        TransactionRepository::new()
    }

    pub fn items() -> ItemRepository {
        ItemRepository::new()
    }

    pub fn tiles() -> TileRepository {
        TileRepository::new()
    }
}
