//! Modelos de los datos de contacto de un cliente
//!
//! Contactos, documentos y direcciones cuelgan de `customers` por
//! `customer_id` y se borran en cascada con el cliente.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::{AddressInput, ContactInput, DocumentInput};
use crate::repositories::{Columns, Repositories, Resource, ResourceRepository, ResourceWriter, Writable};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub contact_type: String,
    pub number: String,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub document_type: String,
    pub country: Option<String>,
    pub value: String,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub street: String,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource for Contact {
    const TABLE: &'static str = "contacts";
    const NAME: &'static str = "Contact";
    const SEARCH_COLUMNS: &'static [&'static str] = &["number"];

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
        vec![Some(self.number.as_str())]
    }

    fn repository(repositories: &Repositories) -> Arc<dyn ResourceRepository<Self>> {
        repositories.contacts.clone()
    }
}

impl Writable for Contact {
    type Input = ContactInput;

    const REQUIRED: &'static [&'static str] = &["type", "number"];
    const PARENT_COLUMN: Option<&'static str> = Some("customer_id");

    fn columns(input: &ContactInput) -> Columns {
        Columns::new()
            .text("type", &input.contact_type)
            .text("number", &input.number)
    }

    fn writer(repositories: &Repositories) -> Arc<dyn ResourceWriter<Self>> {
        repositories.contact_writer.clone()
    }
}

impl Resource for Document {
    const TABLE: &'static str = "documents";
    const NAME: &'static str = "Document";
    const SEARCH_COLUMNS: &'static [&'static str] = &["value"];

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
        vec![Some(self.value.as_str())]
    }

    fn repository(repositories: &Repositories) -> Arc<dyn ResourceRepository<Self>> {
        repositories.documents.clone()
    }
}

impl Writable for Document {
    type Input = DocumentInput;

    const REQUIRED: &'static [&'static str] = &["type", "value"];
    const PARENT_COLUMN: Option<&'static str> = Some("customer_id");

    fn columns(input: &DocumentInput) -> Columns {
        Columns::new()
            .text("type", &input.document_type)
            .text("country", &input.country)
            .text("value", &input.value)
    }

    fn writer(repositories: &Repositories) -> Arc<dyn ResourceWriter<Self>> {
        repositories.document_writer.clone()
    }
}

impl Resource for Address {
    const TABLE: &'static str = "addresses";
    const NAME: &'static str = "Address";
    const SEARCH_COLUMNS: &'static [&'static str] = &["street", "city", "zip"];

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
        vec![Some(self.street.as_str()), self.city.as_deref(), self.zip.as_deref()]
    }

    fn repository(repositories: &Repositories) -> Arc<dyn ResourceRepository<Self>> {
        repositories.addresses.clone()
    }
}

impl Writable for Address {
    type Input = AddressInput;

    const REQUIRED: &'static [&'static str] = &["street"];
    const PARENT_COLUMN: Option<&'static str> = Some("customer_id");

    fn columns(input: &AddressInput) -> Columns {
        Columns::new()
            .text("street", &input.street)
            .text("number", &input.number)
            .text("complement", &input.complement)
            .text("neighborhood", &input.neighborhood)
            .text("city", &input.city)
            .text("state", &input.state)
            .text("zip", &input.zip)
    }

    fn writer(repositories: &Repositories) -> Arc<dyn ResourceWriter<Self>> {
        repositories.address_writer.clone()
    }
}
