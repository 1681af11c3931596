//! Modelo de CatalogItem
//!
//! Piezas y servicios del catálogo del taller (tabla `catalog`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

use crate::repositories::{Repositories, Resource, ResourceRepository};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub description: String,
    pub sku: Option<String>,
    pub value: Decimal,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub item_type: String,
    pub has_conditional_price: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource for CatalogItem {
    const TABLE: &'static str = "catalog";
    const NAME: &'static str = "CatalogItem";
    const SEARCH_COLUMNS: &'static [&'static str] = &["description", "sku"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn search_fields(&self) -> Vec<Option<&str>> {
        vec![Some(self.description.as_str()), self.sku.as_deref()]
    }

    fn repository(repositories: &Repositories) -> Arc<dyn ResourceRepository<Self>> {
        repositories.catalog.clone()
    }
}
