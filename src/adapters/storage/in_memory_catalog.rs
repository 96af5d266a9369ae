//! In-memory product and member catalog.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::Product;
use crate::domain::foundation::{ProductId, UserId};
use crate::ports::{CatalogReader, LedgerError, Member};

#[derive(Debug, Clone)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    members: Arc<RwLock<HashMap<UserId, Member>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            products: Arc::new(RwLock::new(HashMap::new())),
            members: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn add_product(&self, product: Product) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }

    pub async fn add_member(&self, member: Member) {
        self.members
            .write()
            .await
            .insert(member.user_id.clone(), member);
    }

    /// Clear all stored data (useful for tests)
    pub async fn clear(&self) {
        self.products.write().await.clear();
        self.members.write().await.clear();
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogReader for InMemoryCatalog {
    async fn load_product(&self, id: &ProductId) -> Result<Option<Product>, LedgerError> {
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn load_member(&self, id: &UserId) -> Result<Option<Member>, LedgerError> {
        Ok(self.members.read().await.get(id).cloned())
    }
}
