//! Modelo de Employee

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

use crate::repositories::{Repositories, Resource, ResourceRepository};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub cpf: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource for Employee {
    const TABLE: &'static str = "employees";
    const NAME: &'static str = "Employee";
    const SEARCH_COLUMNS: &'static [&'static str] = &["name", "cpf", "email"];

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
        vec![Some(self.name.as_str()), self.cpf.as_deref(), self.email.as_deref()]
    }

    fn repository(repositories: &Repositories) -> Arc<dyn ResourceRepository<Self>> {
        repositories.employees.clone()
    }
}
