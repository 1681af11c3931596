//! Modelos de ServiceOrder y ServiceOrderItem
//!
//! Una orden de servicio referencia exactamente un cliente y un vehículo;
//! sus items cuelgan de `service_order_id`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{customer::Customer, vehicle::Vehicle};
use crate::repositories::{Repositories, Resource, ResourceRepository};

/// Estado asignado a una orden nueva cuando la petición no trae ninguno
pub const DEFAULT_SERVICE_ORDER_STATUS: &str = "pending";

/// Tipo asignado a un item nuevo cuando la petición no trae ninguno
pub const DEFAULT_ITEM_TYPE: &str = "parts";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub status: String,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub insurance_company_id: Option<Uuid>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrderItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub service_order_id: Uuid,
    pub catalog_item_id: Option<Uuid>,
    pub description: String,
    pub value: Decimal,
    pub quantity: i32,
    pub discount: Option<Decimal>,
    pub total: Decimal,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub item_type: String,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Total de un item cuando la petición no lo informa
pub fn compute_total(value: Decimal, quantity: i32, discount: Option<Decimal>) -> Decimal {
    value * Decimal::from(quantity) - discount.unwrap_or(Decimal::ZERO)
}

/// Campos que el flujo de upsert escribe en `service_orders`.
/// `customer_id` y `vehicle_id` ya vienen resueltos.
#[derive(Debug, Clone)]
pub struct ServiceOrderChanges {
    pub id: Option<Uuid>,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub status: Option<String>,
    pub insurance_company_id: Option<Uuid>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

/// Orden compuesta con sus items, cliente y vehículo
#[derive(Debug, Clone, Serialize)]
pub struct ServiceOrderDetail {
    #[serde(flatten)]
    pub service_order: ServiceOrder,
    pub service_order_items: Vec<ServiceOrderItem>,
    pub customer: Customer,
    pub vehicle: Vehicle,
}

impl Resource for ServiceOrder {
    const TABLE: &'static str = "service_orders";
    const NAME: &'static str = "ServiceOrder";
    const SEARCH_COLUMNS: &'static [&'static str] = &["status", "note"];

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
        vec![Some(self.status.as_str()), self.note.as_deref()]
    }

    fn repository(repositories: &Repositories) -> Arc<dyn ResourceRepository<Self>> {
        repositories.service_order_rows.clone()
    }
}

impl Resource for ServiceOrderItem {
    const TABLE: &'static str = "service_order_items";
    const NAME: &'static str = "ServiceOrderItem";
    const SEARCH_COLUMNS: &'static [&'static str] = &["description"];

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
        vec![Some(self.description.as_str())]
    }

    fn repository(repositories: &Repositories) -> Arc<dyn ResourceRepository<Self>> {
        repositories.service_order_items.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_compute_total() {
        let value = Decimal::from_str("19.90").unwrap();
        let discount = Decimal::from_str("4.70").unwrap();
        assert_eq!(compute_total(value, 3, Some(discount)), Decimal::from(55));
        assert_eq!(compute_total(Decimal::from(50), 1, None), Decimal::from(50));
    }
}
