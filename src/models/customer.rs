//! Modelo de Customer
//!
//! Mapea la tabla `customers`. Un cliente es único por tenant solo por su id.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::CustomerInput;
use crate::repositories::{Columns, Repositories, Resource, ResourceRepository, ResourceWriter, Writable};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub status: String,
    pub name: String,
    pub email: Option<String>,
    pub document: Option<String>,
    pub phone: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub note: Option<String>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource for Customer {
    const TABLE: &'static str = "customers";
    const NAME: &'static str = "Customer";
    const SEARCH_COLUMNS: &'static [&'static str] = &["name", "email", "document", "phone"];
    const STATUS_FILTER: Option<(&'static str, &'static str)> = Some(("status", "active"));
    const RELATED_SEARCH: &'static [(&'static str, &'static str, &'static str)] = &[
        ("documents", "customer_id", "value"),
        ("contacts", "customer_id", "number"),
    ];

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
        vec![
            Some(self.name.as_str()),
            self.email.as_deref(),
            self.document.as_deref(),
            self.phone.as_deref(),
        ]
    }

    fn status(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn repository(repositories: &Repositories) -> Arc<dyn ResourceRepository<Self>> {
        repositories.customers.clone()
    }
}

impl Writable for Customer {
    type Input = CustomerInput;

    const REQUIRED: &'static [&'static str] = &["name"];

    fn columns(input: &CustomerInput) -> Columns {
        Columns::new()
            .text("status", &input.status)
            .text("name", &input.name)
            .text("email", &input.email)
            .text("document", &input.document)
            .text("phone", &input.phone)
            .date("birthdate", input.birthdate)
            .text("note", &input.note)
    }

    fn writer(repositories: &Repositories) -> Arc<dyn ResourceWriter<Self>> {
        repositories.customer_writer.clone()
    }
}
