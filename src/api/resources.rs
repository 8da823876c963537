// Typed resource endpoints
// Generic CRUD over the versioned REST prefix, one accessor per family.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::client::ApiClient;
use super::models::{Brand, Category, Movement, Page, Product, StoreLocation, Supplier, UserProfile};
use crate::error::Result;

/// CRUD client for one resource family, bound to its collection path.
pub struct ResourceClient<'a, T> {
    client: &'a ApiClient,
    path: &'static str,
    _marker: PhantomData<T>,
}

impl<'a, T: DeserializeOwned> ResourceClient<'a, T> {
    fn new(client: &'a ApiClient, path: &'static str) -> Self {
        Self {
            client,
            path,
            _marker: PhantomData,
        }
    }

    fn item_path(&self, id: i64) -> String {
        format!("{}{}/", self.path, id)
    }

    /// List a page of resources. `query` passes through as-is (search,
    /// page, filters).
    pub async fn list(&self, query: &[(&str, &str)]) -> Result<Page<T>> {
        self.client.get_json(self.path, query).await
    }

    pub async fn retrieve(&self, id: i64) -> Result<T> {
        self.client.get_json(&self.item_path(id), &[]).await
    }

    pub async fn create<B: Serialize + ?Sized>(&self, body: &B) -> Result<T> {
        self.client.post_json(self.path, body).await
    }

    pub async fn update<B: Serialize + ?Sized>(&self, id: i64, body: &B) -> Result<T> {
        self.client.patch_json(&self.item_path(id), body).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.client.delete(&self.item_path(id)).await
    }
}

impl ApiClient {
    pub fn products(&self) -> ResourceClient<'_, Product> {
        ResourceClient::new(self, "/api/v1/products/")
    }

    pub fn brands(&self) -> ResourceClient<'_, Brand> {
        ResourceClient::new(self, "/api/v1/brands/")
    }

    pub fn categories(&self) -> ResourceClient<'_, Category> {
        ResourceClient::new(self, "/api/v1/categories/")
    }

    pub fn suppliers(&self) -> ResourceClient<'_, Supplier> {
        ResourceClient::new(self, "/api/v1/suppliers/")
    }

    pub fn stores(&self) -> ResourceClient<'_, StoreLocation> {
        ResourceClient::new(self, "/api/v1/stores/")
    }

    pub fn movements(&self) -> ResourceClient<'_, Movement> {
        ResourceClient::new(self, "/api/v1/movements/")
    }

    pub fn users(&self) -> ResourceClient<'_, UserProfile> {
        ResourceClient::new(self, "/api/v1/users/")
    }
}
