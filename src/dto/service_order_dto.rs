use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::{
    validate_customer_status, validate_non_negative, validate_not_blank, validate_plate,
};

// Request de POST /service_orders
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrderRequest {
    pub id: Option<Uuid>,
    pub customer: Option<CustomerInput>,
    pub vehicle: Option<VehicleInput>,
    #[validate(length(min = 1, max = 50))]
    pub status: Option<String>,
    pub insurance_company_id: Option<Uuid>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
    #[serde(default, rename = "service_order_items")]
    pub items: Vec<ServiceOrderItemInput>,
}

// Cliente embebido en la orden; con `id` se actualiza, sin él se crea
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    pub id: Option<Uuid>,
    #[validate(length(max = 255), custom = "validate_not_blank")]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub document: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(custom = "validate_customer_status")]
    pub status: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub note: Option<String>,
}

// Vehículo embebido en la orden
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInput {
    pub id: Option<Uuid>,
    #[validate(custom = "validate_plate")]
    pub plate: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 100))]
    pub model: Option<String>,
    #[validate(range(min = 1900, max = 2100))]
    pub year: Option<i32>,
    #[validate(length(max = 50))]
    pub color: Option<String>,
    pub km: Option<String>,
    pub fuel: Option<String>,
    #[validate(length(max = 50))]
    pub chassis: Option<String>,
}

// Item de la orden; `id` es la clave propia del item
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrderItemInput {
    pub id: Option<Uuid>,
    pub catalog_item_id: Option<Uuid>,
    #[validate(length(max = 255), custom = "validate_not_blank")]
    pub description: Option<String>,
    #[validate(custom = "validate_non_negative")]
    pub value: Option<Decimal>,
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    #[validate(custom = "validate_non_negative")]
    pub discount: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    pub total: Option<Decimal>,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 30))]
    pub item_type: Option<String>,
}

impl CustomerInput {
    /// `true` cuando el objeto no trae ningún campo reconocido
    pub fn is_blank(&self) -> bool {
        self.id.is_none()
            && self.name.is_none()
            && self.email.is_none()
            && self.document.is_none()
            && self.phone.is_none()
            && self.status.is_none()
            && self.birthdate.is_none()
            && self.note.is_none()
    }
}

impl VehicleInput {
    pub fn is_blank(&self) -> bool {
        self.id.is_none()
            && self.plate.is_none()
            && self.brand.is_none()
            && self.model.is_none()
            && self.year.is_none()
            && self.color.is_none()
            && self.km.is_none()
            && self.fuel.is_none()
            && self.chassis.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_deserializes_camel_case_and_items() {
        let request: ServiceOrderRequest = serde_json::from_value(json!({
            "customer": {"name": "Ana"},
            "vehicle": {"plate": "ABC-1234"},
            "status": "pending",
            "insuranceCompanyId": "6f1c1f0e-2f43-4d0e-9a57-3d3c8f1f8b11",
            "service_order_items": [
                {"description": "Oil change", "value": 50, "quantity": 1, "total": 50, "type": "service"}
            ]
        }))
        .unwrap();

        assert_eq!(request.customer.unwrap().name.as_deref(), Some("Ana"));
        assert_eq!(request.vehicle.unwrap().plate.as_deref(), Some("ABC-1234"));
        assert!(request.insurance_company_id.is_some());
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.items[0].item_type.as_deref(), Some("service"));
        assert_eq!(request.items[0].total, Some(Decimal::from(50)));
    }

    #[test]
    fn test_missing_items_default_to_empty() {
        let request: ServiceOrderRequest =
            serde_json::from_value(json!({"customer": {"name": "Ana"}, "vehicle": {"plate": "ABC1234"}})).unwrap();
        assert!(request.items.is_empty());
    }

    #[test]
    fn test_blank_inputs() {
        assert!(CustomerInput::default().is_blank());
        assert!(VehicleInput::default().is_blank());

        let customer: CustomerInput = serde_json::from_value(json!({"unknown": 1})).unwrap();
        assert!(customer.is_blank());

        let customer = CustomerInput {
            id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(!customer.is_blank());
    }

    #[test]
    fn test_field_validation() {
        let vehicle = VehicleInput {
            plate: Some("not a plate".to_string()),
            ..Default::default()
        };
        assert!(vehicle.validate().is_err());

        let customer = CustomerInput {
            name: Some("Ana".to_string()),
            status: Some("archived".to_string()),
            ..Default::default()
        };
        assert!(customer.validate().is_err());

        let item = ServiceOrderItemInput {
            description: Some("Oil change".to_string()),
            value: Some(Decimal::from(50)),
            quantity: Some(0),
            ..Default::default()
        };
        assert!(item.validate().is_err());
    }
}
