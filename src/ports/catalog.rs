//! Read-only access to products and members.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::Product;
use crate::domain::foundation::{ProductId, UserId};

use super::LedgerError;

/// Contact details needed when creating a processor customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub email: String,
    pub full_name: String,
}

#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn load_product(&self, id: &ProductId) -> Result<Option<Product>, LedgerError>;

    async fn load_member(&self, id: &UserId) -> Result<Option<Member>, LedgerError>;
}
