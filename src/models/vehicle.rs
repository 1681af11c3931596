//! Modelo de Vehicle
//!
//! Mapea la tabla `vehicles`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::VehicleInput;
use crate::repositories::{Columns, Repositories, Resource, ResourceRepository, ResourceWriter, Writable};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub plate: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub km: Option<String>,
    pub fuel: Option<String>,
    pub chassis: Option<String>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource for Vehicle {
    const TABLE: &'static str = "vehicles";
    const NAME: &'static str = "Vehicle";
    const SEARCH_COLUMNS: &'static [&'static str] = &["plate", "brand", "model"];

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
            Some(self.plate.as_str()),
            self.brand.as_deref(),
            self.model.as_deref(),
        ]
    }

    fn repository(repositories: &Repositories) -> Arc<dyn ResourceRepository<Self>> {
        repositories.vehicles.clone()
    }
}

impl Writable for Vehicle {
    type Input = VehicleInput;

    const REQUIRED: &'static [&'static str] = &["plate"];

    fn columns(input: &VehicleInput) -> Columns {
        Columns::new()
            .text("plate", &input.plate)
            .text("brand", &input.brand)
            .text("model", &input.model)
            .int("year", input.year)
            .text("color", &input.color)
            .text("km", &input.km)
            .text("fuel", &input.fuel)
            .text("chassis", &input.chassis)
    }

    fn writer(repositories: &Repositories) -> Arc<dyn ResourceWriter<Self>> {
        repositories.vehicle_writer.clone()
    }
}
