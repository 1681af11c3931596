//! Almacén en memoria
//!
//! Implementa los mismos traits que los repositorios PostgreSQL para poder
//! ejecutar el router completo en los tests sin base de datos. Reproduce las
//! restricciones que importan al flujo: NOT NULL, claves foráneas al borrar,
//! aislamiento por tenant y atomicidad de la transacción.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    normalize_search, Column, Columns, CustomerVehicleRepository, ListFilter, Resource,
    ResourceRepository, ResourceWriter, ServiceOrderStore, ServiceOrderTx, Writable,
};
use crate::dto::{CustomerInput, Page, PageRequest, ServiceOrderItemInput, VehicleInput};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::service_order::{compute_total, DEFAULT_ITEM_TYPE, DEFAULT_SERVICE_ORDER_STATUS};
use crate::models::{
    Address, CatalogItem, Contact, Customer, Document, Employee, ServiceOrder, ServiceOrderChanges,
    ServiceOrderDetail, ServiceOrderItem, Supplier, Vehicle,
};
use crate::utils::errors::{cross_tenant_error, AppError, AppResult};

#[derive(Debug, Clone, Default)]
pub struct Tables {
    customers: BTreeMap<Uuid, Customer>,
    vehicles: BTreeMap<Uuid, Vehicle>,
    service_orders: BTreeMap<Uuid, ServiceOrder>,
    service_order_items: BTreeMap<Uuid, ServiceOrderItem>,
    catalog: BTreeMap<Uuid, CatalogItem>,
    employees: BTreeMap<Uuid, Employee>,
    suppliers: BTreeMap<Uuid, Supplier>,
    contacts: BTreeMap<Uuid, Contact>,
    documents: BTreeMap<Uuid, Document>,
    addresses: BTreeMap<Uuid, Address>,
    // (customer_id, vehicle_id) en orden de vinculación
    customer_vehicles: Vec<(Uuid, Uuid)>,
    // Secuencia de inserción de los items, como la columna `position`
    item_positions: BTreeMap<Uuid, u64>,
    next_item_position: u64,
}

/// Recurso con tabla propia dentro de `Tables`
pub trait MemoryTable: Resource {
    /// Valores por defecto de columnas que el INSERT puede omitir
    const DEFAULTS: &'static [(&'static str, &'static str)] = &[];

    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self>;
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self>;

    /// `true` si otra fila apunta a `id` y el borrado violaría la clave foránea
    fn is_referenced(_tables: &Tables, _id: Uuid) -> bool {
        false
    }

    /// Búsqueda en tablas hijas (`Resource::RELATED_SEARCH`)
    fn related_match(_tables: &Tables, _id: Uuid, _term: &str) -> bool {
        false
    }

    /// Borrados en cascada tras eliminar la fila `id`
    fn cascade(_tables: &mut Tables, _id: Uuid) {}
}

impl MemoryTable for Customer {
    const DEFAULTS: &'static [(&'static str, &'static str)] = &[("status", "active")];

    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self> {
        &tables.customers
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self> {
        &mut tables.customers
    }

    fn is_referenced(tables: &Tables, id: Uuid) -> bool {
        tables.service_orders.values().any(|order| order.customer_id == id)
    }

    fn related_match(tables: &Tables, id: Uuid, term: &str) -> bool {
        let documents = tables
            .documents
            .values()
            .filter(|document| document.customer_id == id)
            .any(|document| contains_ignore_case(&document.value, term));
        documents
            || tables
                .contacts
                .values()
                .filter(|contact| contact.customer_id == id)
                .any(|contact| contains_ignore_case(&contact.number, term))
    }

    fn cascade(tables: &mut Tables, id: Uuid) {
        tables.contacts.retain(|_, contact| contact.customer_id != id);
        tables.documents.retain(|_, document| document.customer_id != id);
        tables.addresses.retain(|_, address| address.customer_id != id);
        tables.customer_vehicles.retain(|(customer_id, _)| *customer_id != id);
    }
}

impl MemoryTable for Vehicle {
    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self> {
        &tables.vehicles
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self> {
        &mut tables.vehicles
    }

    fn is_referenced(tables: &Tables, id: Uuid) -> bool {
        tables.service_orders.values().any(|order| order.vehicle_id == id)
    }

    fn cascade(tables: &mut Tables, id: Uuid) {
        tables.customer_vehicles.retain(|(_, vehicle_id)| *vehicle_id != id);
    }
}

impl MemoryTable for ServiceOrder {
    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self> {
        &tables.service_orders
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self> {
        &mut tables.service_orders
    }

    fn is_referenced(tables: &Tables, id: Uuid) -> bool {
        tables
            .service_order_items
            .values()
            .any(|item| item.service_order_id == id)
    }
}

impl MemoryTable for ServiceOrderItem {
    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self> {
        &tables.service_order_items
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self> {
        &mut tables.service_order_items
    }

    fn cascade(tables: &mut Tables, id: Uuid) {
        tables.item_positions.remove(&id);
    }
}

impl MemoryTable for CatalogItem {
    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self> {
        &tables.catalog
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self> {
        &mut tables.catalog
    }

    fn is_referenced(tables: &Tables, id: Uuid) -> bool {
        tables
            .service_order_items
            .values()
            .any(|item| item.catalog_item_id == Some(id))
    }
}

impl MemoryTable for Employee {
    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self> {
        &tables.employees
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self> {
        &mut tables.employees
    }
}

impl MemoryTable for Supplier {
    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self> {
        &tables.suppliers
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self> {
        &mut tables.suppliers
    }
}

impl MemoryTable for Contact {
    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self> {
        &tables.contacts
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self> {
        &mut tables.contacts
    }
}

impl MemoryTable for Document {
    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self> {
        &tables.documents
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self> {
        &mut tables.documents
    }
}

impl MemoryTable for Address {
    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self> {
        &tables.addresses
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self> {
        &mut tables.addresses
    }
}

fn lock(tables: &Mutex<Tables>) -> AppResult<MutexGuard<'_, Tables>> {
    tables
        .lock()
        .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
}

fn not_null(table: &str, column: &str) -> AppError {
    AppError::Persistence(format!(
        "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
        column, table
    ))
}

fn contains_ignore_case(field: &str, term: &str) -> bool {
    field.to_lowercase().contains(&term.to_lowercase())
}

fn matches_search<R: MemoryTable>(tables: &Tables, row: &R, term: &str) -> bool {
    row.search_fields()
        .into_iter()
        .flatten()
        .any(|field| contains_ignore_case(field, term))
        || R::related_match(tables, row.id(), term)
}

/// Nombre de columna SQL a clave JSON de los modelos
fn json_key(column: &str) -> String {
    let mut key = String::with_capacity(column.len());
    let mut upper = false;
    for ch in column.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            key.extend(ch.to_uppercase());
            upper = false;
        } else {
            key.push(ch);
        }
    }
    key
}

fn json_value(value: Column) -> Value {
    match value {
        Column::Text(text) => Value::String(text),
        Column::Int(number) => json!(number),
        Column::Date(date) => Value::String(date.to_string()),
    }
}

/// Materializa una fila a partir de su JSON, como haría `RETURNING *`
fn decode_row<R: Writable>(row: Map<String, Value>) -> AppResult<R> {
    serde_json::from_value(Value::Object(row))
        .map_err(|error| AppError::Persistence(format!("{}: {}", R::TABLE, error)))
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserta una fila tal cual, sin pasar por el flujo de upsert
    pub fn insert<R: MemoryTable>(&self, row: R) -> AppResult<()> {
        let mut tables = lock(&self.tables)?;
        R::table_mut(&mut tables).insert(row.id(), row);
        Ok(())
    }

    /// Todas las filas de una tabla, de todos los tenants
    pub fn all<R: MemoryTable>(&self) -> AppResult<Vec<R>> {
        let tables = lock(&self.tables)?;
        Ok(R::table(&tables).values().cloned().collect())
    }

    pub fn count<R: MemoryTable>(&self) -> AppResult<usize> {
        let tables = lock(&self.tables)?;
        Ok(R::table(&tables).len())
    }
}

#[async_trait]
impl<R: MemoryTable> ResourceRepository<R> for MemoryStore {
    async fn list(&self, tenant_id: Uuid, filter: ListFilter<'_>, page: PageRequest) -> AppResult<Page<R>> {
        let tables = lock(&self.tables)?;
        let search = normalize_search(filter.search);

        let mut rows: Vec<R> = R::table(&tables)
            .values()
            .filter(|row| row.tenant_id() == tenant_id)
            .filter(|row| search.map_or(true, |term| matches_search(&tables, *row, term)))
            .filter(|row| filter.status.map_or(true, |status| row.status() == Some(status)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.updated_at()
                .cmp(&a.updated_at())
                .then_with(|| a.id().cmp(&b.id()))
        });

        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();

        Ok(Page { items, total })
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> AppResult<Option<R>> {
        let tables = lock(&self.tables)?;
        Ok(R::table(&tables)
            .get(&id)
            .filter(|row| row.tenant_id() == tenant_id)
            .cloned())
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> AppResult<bool> {
        let mut tables = lock(&self.tables)?;
        let owned = R::table(&tables)
            .get(&id)
            .is_some_and(|row| row.tenant_id() == tenant_id);
        if !owned {
            return Ok(false);
        }
        if R::is_referenced(&tables, id) {
            return Err(AppError::Persistence(format!(
                "{} '{}' is still referenced by other rows",
                R::NAME,
                id
            )));
        }
        R::table_mut(&mut tables).remove(&id);
        R::cascade(&mut tables, id);
        Ok(true)
    }
}

#[async_trait]
impl<R: MemoryTable + Writable> ResourceWriter<R> for MemoryStore {
    async fn create(&self, actor: &AuthenticatedUser, parent_id: Option<Uuid>, columns: Columns) -> AppResult<R> {
        let mut tables = lock(&self.tables)?;
        let now = Utc::now();

        let mut row = Map::new();
        row.insert("id".to_string(), json!(Uuid::new_v4()));
        row.insert("tenantId".to_string(), json!(actor.tenant_id));
        row.insert("createdBy".to_string(), json!(actor.user_id));
        row.insert("createdAt".to_string(), json!(now));
        row.insert("updatedAt".to_string(), json!(now));
        for (column, value) in R::DEFAULTS {
            row.insert(json_key(column), json!(value));
        }
        if let Some(column) = R::PARENT_COLUMN {
            let parent_id =
                parent_id.ok_or_else(|| AppError::Internal(format!("{} requires {}", R::NAME, column)))?;
            if !tables.customers.contains_key(&parent_id) {
                return Err(AppError::Persistence(format!(
                    "insert on \"{}\" violates foreign key \"{}\"",
                    R::TABLE,
                    column
                )));
            }
            row.insert(json_key(column), json!(parent_id));
        }
        for (column, value) in columns {
            row.insert(json_key(column), json_value(value));
        }

        let row: R = decode_row(row)?;
        R::table_mut(&mut tables).insert(row.id(), row.clone());
        Ok(row)
    }

    async fn patch(&self, actor: &AuthenticatedUser, id: Uuid, columns: Columns) -> AppResult<Option<R>> {
        let mut tables = lock(&self.tables)?;
        let Some(current) = R::table(&tables)
            .get(&id)
            .filter(|row| row.tenant_id() == actor.tenant_id)
        else {
            return Ok(None);
        };

        let Value::Object(mut row) =
            serde_json::to_value(current).map_err(|error| AppError::Internal(error.to_string()))?
        else {
            return Err(AppError::Internal(format!("{} is not a JSON object", R::NAME)));
        };
        row.insert("updatedBy".to_string(), json!(actor.user_id));
        row.insert("updatedAt".to_string(), json!(Utc::now()));
        for (column, value) in columns {
            row.insert(json_key(column), json_value(value));
        }

        let row: R = decode_row(row)?;
        R::table_mut(&mut tables).insert(id, row.clone());
        Ok(Some(row))
    }

    async fn list_by_parent(&self, tenant_id: Uuid, parent_id: Uuid) -> AppResult<Vec<R>> {
        let Some(column) = R::PARENT_COLUMN else {
            return Err(AppError::Internal(format!("{} has no parent column", R::NAME)));
        };
        let tables = lock(&self.tables)?;
        let key = json_key(column);

        let mut rows: Vec<(DateTime<Utc>, R)> = Vec::new();
        for row in R::table(&tables).values().filter(|row| row.tenant_id() == tenant_id) {
            let value = serde_json::to_value(row).map_err(|error| AppError::Internal(error.to_string()))?;
            if value.get(&key) != Some(&json!(parent_id)) {
                continue;
            }
            let created_at = value
                .get("createdAt")
                .cloned()
                .and_then(|created_at| serde_json::from_value(created_at).ok())
                .unwrap_or_else(|| row.updated_at());
            rows.push((created_at, row.clone()));
        }
        rows.sort_by(|(a_created, a), (b_created, b)| a_created.cmp(b_created).then_with(|| a.id().cmp(&b.id())));
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }
}

#[async_trait]
impl CustomerVehicleRepository for MemoryStore {
    async fn vehicles_of(&self, tenant_id: Uuid, customer_id: Uuid) -> AppResult<Vec<Vehicle>> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .customer_vehicles
            .iter()
            .filter(|(customer, _)| *customer == customer_id)
            .filter_map(|(_, vehicle_id)| tables.vehicles.get(vehicle_id))
            .filter(|vehicle| vehicle.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn customers_of(&self, tenant_id: Uuid, vehicle_id: Uuid) -> AppResult<Vec<Customer>> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .customer_vehicles
            .iter()
            .filter(|(_, vehicle)| *vehicle == vehicle_id)
            .filter_map(|(customer_id, _)| tables.customers.get(customer_id))
            .filter(|customer| customer.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn create_vehicle_for(
        &self,
        actor: &AuthenticatedUser,
        customer_id: Uuid,
        columns: Columns,
    ) -> AppResult<Vehicle> {
        let vehicle: Vehicle = ResourceWriter::<Vehicle>::create(self, actor, None, columns).await?;
        let mut tables = lock(&self.tables)?;
        if !tables.customers.contains_key(&customer_id) {
            // Deshace el INSERT del vehículo, como el rollback de la transacción
            tables.vehicles.remove(&vehicle.id);
            return Err(AppError::Persistence(format!(
                "insert on \"customer_vehicles\" violates foreign key \"customer_id\" ({})",
                customer_id
            )));
        }
        tables.customer_vehicles.push((customer_id, vehicle.id));
        Ok(vehicle)
    }
}

#[async_trait]
impl ServiceOrderStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn ServiceOrderTx>> {
        let working = lock(&self.tables)?.clone();
        Ok(Box::new(MemoryTx {
            shared: self.tables.clone(),
            working,
            touched: Touched::default(),
            inserted_items: Vec::new(),
        }))
    }

    async fn find_detail(&self, tenant_id: Uuid, id: Uuid) -> AppResult<Option<ServiceOrderDetail>> {
        let tables = lock(&self.tables)?;
        let Some(service_order) = tables
            .service_orders
            .get(&id)
            .filter(|order| order.tenant_id == tenant_id)
            .cloned()
        else {
            return Ok(None);
        };

        let mut service_order_items: Vec<ServiceOrderItem> = tables
            .service_order_items
            .values()
            .filter(|item| item.service_order_id == id && item.tenant_id == tenant_id)
            .cloned()
            .collect();
        service_order_items.sort_by_key(|item| (tables.item_positions.get(&item.id).copied(), item.id));

        let customer = tables
            .customers
            .get(&service_order.customer_id)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("Service order {} has no customer", id)))?;
        let vehicle = tables
            .vehicles
            .get(&service_order.vehicle_id)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("Service order {} has no vehicle", id)))?;

        Ok(Some(ServiceOrderDetail {
            service_order,
            service_order_items,
            customer,
            vehicle,
        }))
    }
}

#[derive(Default)]
struct Touched {
    customers: BTreeSet<Uuid>,
    vehicles: BTreeSet<Uuid>,
    service_orders: BTreeSet<Uuid>,
    service_order_items: BTreeSet<Uuid>,
}

/// Transacción sobre una copia de las tablas; sólo `commit` publica las
/// filas tocadas.
struct MemoryTx {
    shared: Arc<Mutex<Tables>>,
    working: Tables,
    touched: Touched,
    // Items insertados, en orden; reciben `position` al hacer commit
    inserted_items: Vec<Uuid>,
}

impl MemoryTx {
    /// Resuelve el id de la fila: `Ok(Some)` si existe en el tenant,
    /// `Ok(None)` si hay que insertarla, error si es de otro tenant.
    fn existing<R: MemoryTable>(&self, tenant_id: Uuid, id: Option<Uuid>) -> AppResult<Option<R>> {
        let Some(id) = id else {
            return Ok(None);
        };
        match R::table(&self.working).get(&id) {
            Some(row) if row.tenant_id() == tenant_id => Ok(Some(row.clone())),
            Some(_) => Err(cross_tenant_error(R::NAME, &id.to_string())),
            None => Ok(None),
        }
    }
}

fn publish<R: MemoryTable>(shared: &mut Tables, working: &Tables, ids: &BTreeSet<Uuid>) {
    for id in ids {
        if let Some(row) = R::table(working).get(id) {
            R::table_mut(shared).insert(*id, row.clone());
        }
    }
}

#[async_trait]
impl ServiceOrderTx for MemoryTx {
    async fn upsert_customer(&mut self, actor: &AuthenticatedUser, input: &CustomerInput) -> AppResult<Customer> {
        let now = Utc::now();
        let customer = match self.existing::<Customer>(actor.tenant_id, input.id)? {
            Some(current) => Customer {
                name: input.name.clone().unwrap_or(current.name),
                email: input.email.clone().or(current.email),
                document: input.document.clone().or(current.document),
                phone: input.phone.clone().or(current.phone),
                status: input.status.clone().unwrap_or(current.status),
                birthdate: input.birthdate.or(current.birthdate),
                note: input.note.clone().or(current.note),
                updated_by: Some(actor.user_id),
                updated_at: now,
                ..current
            },
            None => Customer {
                id: input.id.unwrap_or_else(Uuid::new_v4),
                tenant_id: actor.tenant_id,
                status: input.status.clone().unwrap_or_else(|| "active".to_string()),
                name: input.name.clone().ok_or_else(|| not_null(Customer::TABLE, "name"))?,
                email: input.email.clone(),
                document: input.document.clone(),
                phone: input.phone.clone(),
                birthdate: input.birthdate,
                note: input.note.clone(),
                created_by: Some(actor.user_id),
                updated_by: None,
                created_at: now,
                updated_at: now,
            },
        };

        self.working.customers.insert(customer.id, customer.clone());
        self.touched.customers.insert(customer.id);
        Ok(customer)
    }

    async fn upsert_vehicle(&mut self, actor: &AuthenticatedUser, input: &VehicleInput) -> AppResult<Vehicle> {
        let now = Utc::now();
        let vehicle = match self.existing::<Vehicle>(actor.tenant_id, input.id)? {
            Some(current) => Vehicle {
                plate: input.plate.clone().unwrap_or(current.plate),
                brand: input.brand.clone().or(current.brand),
                model: input.model.clone().or(current.model),
                year: input.year.or(current.year),
                color: input.color.clone().or(current.color),
                km: input.km.clone().or(current.km),
                fuel: input.fuel.clone().or(current.fuel),
                chassis: input.chassis.clone().or(current.chassis),
                updated_by: Some(actor.user_id),
                updated_at: now,
                ..current
            },
            None => Vehicle {
                id: input.id.unwrap_or_else(Uuid::new_v4),
                tenant_id: actor.tenant_id,
                plate: input.plate.clone().ok_or_else(|| not_null(Vehicle::TABLE, "plate"))?,
                brand: input.brand.clone(),
                model: input.model.clone(),
                year: input.year,
                color: input.color.clone(),
                km: input.km.clone(),
                fuel: input.fuel.clone(),
                chassis: input.chassis.clone(),
                created_by: Some(actor.user_id),
                updated_by: None,
                created_at: now,
                updated_at: now,
            },
        };

        self.working.vehicles.insert(vehicle.id, vehicle.clone());
        self.touched.vehicles.insert(vehicle.id);
        Ok(vehicle)
    }

    async fn upsert_service_order(
        &mut self,
        actor: &AuthenticatedUser,
        changes: &ServiceOrderChanges,
    ) -> AppResult<ServiceOrder> {
        let now = Utc::now();
        let service_order = match self.existing::<ServiceOrder>(actor.tenant_id, changes.id)? {
            Some(current) => ServiceOrder {
                status: changes.status.clone().unwrap_or(current.status),
                customer_id: changes.customer_id,
                vehicle_id: changes.vehicle_id,
                insurance_company_id: changes.insurance_company_id.or(current.insurance_company_id),
                start_at: changes.start_at.or(current.start_at),
                end_at: changes.end_at.or(current.end_at),
                note: changes.note.clone().or(current.note),
                updated_by: Some(actor.user_id),
                updated_at: now,
                ..current
            },
            None => ServiceOrder {
                id: changes.id.unwrap_or_else(Uuid::new_v4),
                tenant_id: actor.tenant_id,
                status: changes
                    .status
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SERVICE_ORDER_STATUS.to_string()),
                customer_id: changes.customer_id,
                vehicle_id: changes.vehicle_id,
                insurance_company_id: changes.insurance_company_id,
                start_at: changes.start_at,
                end_at: changes.end_at,
                note: changes.note.clone(),
                created_by: Some(actor.user_id),
                updated_by: None,
                created_at: now,
                updated_at: now,
            },
        };

        self.working
            .service_orders
            .insert(service_order.id, service_order.clone());
        self.touched.service_orders.insert(service_order.id);
        Ok(service_order)
    }

    async fn upsert_item(
        &mut self,
        actor: &AuthenticatedUser,
        service_order_id: Uuid,
        input: &ServiceOrderItemInput,
    ) -> AppResult<ServiceOrderItem> {
        if let Some(catalog_item_id) = input.catalog_item_id {
            let exists = self
                .working
                .catalog
                .get(&catalog_item_id)
                .is_some_and(|entry| entry.tenant_id == actor.tenant_id);
            if !exists {
                return Err(AppError::Persistence(format!(
                    "{} '{}' referenced by service order item does not exist",
                    CatalogItem::NAME,
                    catalog_item_id
                )));
            }
        }

        let now = Utc::now();
        let item = match self.existing::<ServiceOrderItem>(actor.tenant_id, input.id)? {
            Some(current) => {
                let value = input.value.unwrap_or(current.value);
                let quantity = input.quantity.unwrap_or(current.quantity);
                let discount = input.discount.or(current.discount);
                ServiceOrderItem {
                    service_order_id,
                    catalog_item_id: input.catalog_item_id.or(current.catalog_item_id),
                    description: input.description.clone().unwrap_or(current.description),
                    value,
                    quantity,
                    discount,
                    total: input
                        .total
                        .unwrap_or_else(|| compute_total(value, quantity, discount)),
                    item_type: input.item_type.clone().unwrap_or(current.item_type),
                    updated_by: Some(actor.user_id),
                    updated_at: now,
                    ..current
                }
            }
            None => {
                let table = ServiceOrderItem::TABLE;
                let value = input.value.ok_or_else(|| not_null(table, "value"))?;
                let quantity = input.quantity.unwrap_or(1);
                ServiceOrderItem {
                    id: input.id.unwrap_or_else(Uuid::new_v4),
                    tenant_id: actor.tenant_id,
                    service_order_id,
                    catalog_item_id: input.catalog_item_id,
                    description: input
                        .description
                        .clone()
                        .ok_or_else(|| not_null(table, "description"))?,
                    value,
                    quantity,
                    discount: input.discount,
                    total: input
                        .total
                        .unwrap_or_else(|| compute_total(value, quantity, input.discount)),
                    item_type: input
                        .item_type
                        .clone()
                        .unwrap_or_else(|| DEFAULT_ITEM_TYPE.to_string()),
                    created_by: Some(actor.user_id),
                    updated_by: None,
                    created_at: now,
                    updated_at: now,
                }
            }
        };

        let inserted = self
            .working
            .service_order_items
            .insert(item.id, item.clone())
            .is_none();
        if inserted {
            self.inserted_items.push(item.id);
        }
        self.touched.service_order_items.insert(item.id);
        Ok(item)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut shared = lock(&self.shared)?;
        publish::<Customer>(&mut shared, &self.working, &self.touched.customers);
        publish::<Vehicle>(&mut shared, &self.working, &self.touched.vehicles);
        publish::<ServiceOrder>(&mut shared, &self.working, &self.touched.service_orders);
        publish::<ServiceOrderItem>(&mut shared, &self.working, &self.touched.service_order_items);
        for id in &self.inserted_items {
            if !shared.item_positions.contains_key(id) {
                let position = shared.next_item_position;
                shared.item_positions.insert(*id, position);
                shared.next_item_position += 1;
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn actor(tenant_id: Uuid) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            tenant_id,
        }
    }

    fn customer_input(name: &str) -> CustomerInput {
        CustomerInput {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let user = actor(Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        tx.upsert_customer(&user, &customer_input("Ana")).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.count::<Customer>().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let user = actor(Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        let customer = tx.upsert_customer(&user, &customer_input("Ana")).await.unwrap();
        tx.commit().await.unwrap();

        let stored = store.all::<Customer>().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, customer.id);
        assert_eq!(stored[0].status, "active");
        assert_eq!(stored[0].tenant_id, user.tenant_id);
    }

    #[tokio::test]
    async fn test_update_keeps_absent_fields() {
        let store = MemoryStore::new();
        let user = actor(Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        let created = tx
            .upsert_customer(
                &user,
                &CustomerInput {
                    name: Some("Ana".to_string()),
                    email: Some("ana@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let updated = tx
            .upsert_customer(
                &user,
                &CustomerInput {
                    id: Some(created.id),
                    phone: Some("555-0101".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Ana");
        assert_eq!(updated.email.as_deref(), Some("ana@example.com"));
        assert_eq!(updated.phone.as_deref(), Some("555-0101"));
        assert_eq!(updated.updated_by, Some(user.user_id));
    }

    #[tokio::test]
    async fn test_foreign_tenant_id_is_forbidden() {
        let store = MemoryStore::new();
        let owner = actor(Uuid::new_v4());
        let intruder = actor(Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        let customer = tx.upsert_customer(&owner, &customer_input("Ana")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let result = tx
            .upsert_customer(
                &intruder,
                &CustomerInput {
                    id: Some(customer.id),
                    name: Some("Mallory".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_item_defaults_and_total() {
        let store = MemoryStore::new();
        let user = actor(Uuid::new_v4());
        let mut tx = store.begin().await.unwrap();

        let item = tx
            .upsert_item(
                &user,
                Uuid::new_v4(),
                &ServiceOrderItemInput {
                    description: Some("Brake pads".to_string()),
                    value: Some(Decimal::from(80)),
                    discount: Some(Decimal::from(5)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(item.quantity, 1);
        assert_eq!(item.item_type, DEFAULT_ITEM_TYPE);
        assert_eq!(item.total, Decimal::from(75));
    }

    #[tokio::test]
    async fn test_item_without_value_violates_not_null() {
        let store = MemoryStore::new();
        let user = actor(Uuid::new_v4());
        let mut tx = store.begin().await.unwrap();

        let result = tx
            .upsert_item(
                &user,
                Uuid::new_v4(),
                &ServiceOrderItemInput {
                    description: Some("Labor".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_list_filters_tenant_and_search() {
        let store = MemoryStore::new();
        let tenant = actor(Uuid::new_v4());
        let other = actor(Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        tx.upsert_customer(&tenant, &customer_input("Ana Souza")).await.unwrap();
        tx.upsert_customer(&tenant, &customer_input("Bruno Lima")).await.unwrap();
        tx.upsert_customer(&other, &customer_input("Ana Other")).await.unwrap();
        tx.commit().await.unwrap();

        let page = ResourceRepository::<Customer>::list(&store, tenant.tenant_id, ListFilter::search("  ana "), PageRequest::new(None, None))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Ana Souza");

        let page = ResourceRepository::<Customer>::list(&store, tenant.tenant_id, ListFilter::default(), PageRequest::new(Some(2), Some(1)))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_referenced_customer_fails() {
        let store = MemoryStore::new();
        let user = actor(Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        let customer = tx.upsert_customer(&user, &customer_input("Ana")).await.unwrap();
        let vehicle = tx
            .upsert_vehicle(
                &user,
                &VehicleInput {
                    plate: Some("ABC-1234".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        tx.upsert_service_order(
            &user,
            &ServiceOrderChanges {
                id: None,
                customer_id: customer.id,
                vehicle_id: vehicle.id,
                status: None,
                insurance_company_id: None,
                start_at: None,
                end_at: None,
                note: None,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let result = ResourceRepository::<Customer>::delete(&store, user.tenant_id, customer.id).await;
        assert!(matches!(result, Err(AppError::Persistence(_))));

        let deleted = ResourceRepository::<Customer>::delete(&store, Uuid::new_v4(), customer.id)
            .await
            .unwrap();
        assert!(!deleted);
    }

    fn contact(kind: &str, number: &str) -> Columns {
        Columns::new()
            .text("type", &Some(kind.to_string()))
            .text("number", &Some(number.to_string()))
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_patch_keeps_other_columns() {
        let store = MemoryStore::new();
        let user = actor(Uuid::new_v4());

        let created: Customer = store
            .create(&user, None, Columns::new().text("name", &Some("Ana".to_string())))
            .await
            .unwrap();
        assert_eq!(created.status, "active");
        assert_eq!(created.created_by, Some(user.user_id));

        let patched: Option<Customer> = store
            .patch(&user, created.id, Columns::new().text("phone", &Some("555".to_string())))
            .await
            .unwrap();
        let patched = patched.unwrap();
        assert_eq!(patched.name, "Ana");
        assert_eq!(patched.phone.as_deref(), Some("555"));
        assert_eq!(patched.updated_by, Some(user.user_id));

        let foreign: Option<Customer> = store
            .patch(&actor(Uuid::new_v4()), created.id, Columns::new())
            .await
            .unwrap();
        assert!(foreign.is_none());
    }

    #[tokio::test]
    async fn test_create_without_required_column_fails() {
        let store = MemoryStore::new();
        let user = actor(Uuid::new_v4());

        let result: AppResult<Vehicle> = store.create(&user, None, Columns::new()).await;
        assert!(matches!(result, Err(AppError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_children_follow_customer() {
        let store = MemoryStore::new();
        let user = actor(Uuid::new_v4());
        let customer: Customer = store
            .create(&user, None, Columns::new().text("name", &Some("Ana".to_string())))
            .await
            .unwrap();

        let first: Contact = store.create(&user, Some(customer.id), contact("mobile", "111")).await.unwrap();
        let second: Contact = store.create(&user, Some(customer.id), contact("home", "222")).await.unwrap();
        let contacts: Vec<Contact> = store.list_by_parent(user.tenant_id, customer.id).await.unwrap();
        assert_eq!(
            contacts.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );

        let orphan: AppResult<Contact> = store.create(&user, Some(Uuid::new_v4()), contact("mobile", "333")).await;
        assert!(matches!(orphan, Err(AppError::Persistence(_))));

        let vehicle = store
            .create_vehicle_for(&user, customer.id, Columns::new().text("plate", &Some("ABC-1234".to_string())))
            .await
            .unwrap();
        assert_eq!(store.customers_of(user.tenant_id, vehicle.id).await.unwrap().len(), 1);

        assert!(ResourceRepository::<Customer>::delete(&store, user.tenant_id, customer.id).await.unwrap());
        assert_eq!(store.count::<Contact>().unwrap(), 0);
        assert!(store.vehicles_of(user.tenant_id, customer.id).await.unwrap().is_empty());
        assert_eq!(store.count::<Vehicle>().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_matches_contacts_and_filters_status() {
        let store = MemoryStore::new();
        let user = actor(Uuid::new_v4());
        let ana: Customer = store
            .create(&user, None, Columns::new().text("name", &Some("Ana".to_string())))
            .await
            .unwrap();
        store
            .create(
                &user,
                None,
                Columns::new()
                    .text("name", &Some("Bruno".to_string()))
                    .text("status", &Some("inactive".to_string())),
            )
            .await
            .map(|_: Customer| ())
            .unwrap();
        let _: Contact = store.create(&user, Some(ana.id), contact("mobile", "99887")).await.unwrap();

        let page = ResourceRepository::<Customer>::list(&store, user.tenant_id, ListFilter::search("9887"), PageRequest::new(None, None))
            .await
            .unwrap();
        assert_eq!(page.items.iter().map(|c| c.id).collect::<Vec<_>>(), vec![ana.id]);

        let active = ListFilter {
            search: None,
            status: Some("active"),
        };
        let page = ResourceRepository::<Customer>::list(&store, user.tenant_id, active, PageRequest::new(None, None))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_detail_keeps_item_insertion_order() {
        let store = MemoryStore::new();
        let user = actor(Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        let customer = tx.upsert_customer(&user, &customer_input("Ana")).await.unwrap();
        let vehicle = tx
            .upsert_vehicle(
                &user,
                &VehicleInput {
                    plate: Some("ABC-1234".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let order = tx
            .upsert_service_order(
                &user,
                &ServiceOrderChanges {
                    id: None,
                    customer_id: customer.id,
                    vehicle_id: vehicle.id,
                    status: None,
                    insurance_company_id: None,
                    start_at: None,
                    end_at: None,
                    note: None,
                },
            )
            .await
            .unwrap();
        let descriptions: Vec<String> = (1..=8).map(|n| format!("Item {}", n)).collect();
        for description in &descriptions {
            tx.upsert_item(
                &user,
                order.id,
                &ServiceOrderItemInput {
                    description: Some(description.clone()),
                    value: Some(Decimal::ONE),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let detail = store.find_detail(user.tenant_id, order.id).await.unwrap().unwrap();
        let stored: Vec<String> = detail
            .service_order_items
            .into_iter()
            .map(|item| item.description)
            .collect();
        assert_eq!(stored, descriptions);
    }

    #[test]
    fn test_json_key_converts_snake_case() {
        assert_eq!(json_key("customer_id"), "customerId");
        assert_eq!(json_key("type"), "type");
    }
}
