//! Capa de acceso a datos
//!
//! Los handlers nunca tocan SQL directamente: reciben repositorios a través de
//! `Repositories`, construido una vez en `main`. Hay dos implementaciones:
//! PostgreSQL (`postgres`) y una en memoria usada por los tests (`memory`).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{postgres::PgRow, FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{CustomerInput, Page, PageRequest, ServiceOrderItemInput, VehicleInput};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    Address, CatalogItem, Contact, Customer, Document, Employee, ServiceOrder, ServiceOrderChanges,
    ServiceOrderDetail, ServiceOrderItem, Supplier, Vehicle,
};
use crate::utils::errors::AppResult;

pub use memory::MemoryStore;
pub use postgres::{PgCustomerVehicleRepository, PgResourceRepository, PgServiceOrderStore};

/// Descriptor de una entidad expuesta por los routers genéricos.
pub trait Resource:
    for<'r> FromRow<'r, PgRow> + Serialize + Clone + Send + Sync + Unpin + 'static
{
    /// Tabla SQL
    const TABLE: &'static str;
    /// Nombre legible usado en mensajes de error
    const NAME: &'static str;
    /// Columnas de texto donde busca `/search`
    const SEARCH_COLUMNS: &'static [&'static str];

    /// Columna de estado que filtra `/search` y su valor por defecto
    const STATUS_FILTER: Option<(&'static str, &'static str)> = None;
    /// Tablas hijas que también entran en `/search`: (tabla, fk, columna)
    const RELATED_SEARCH: &'static [(&'static str, &'static str, &'static str)] = &[];

    fn id(&self) -> Uuid;
    fn tenant_id(&self) -> Uuid;
    fn updated_at(&self) -> DateTime<Utc>;

    /// Valores de `SEARCH_COLUMNS`, en el mismo orden
    fn search_fields(&self) -> Vec<Option<&str>>;

    /// Valor de la columna de `STATUS_FILTER`
    fn status(&self) -> Option<&str> {
        None
    }

    fn repository(repositories: &Repositories) -> Arc<dyn ResourceRepository<Self>>;
}

/// Filtros de un listado; `None` desactiva cada uno
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter<'a> {
    pub search: Option<&'a str>,
    pub status: Option<&'a str>,
}

impl<'a> ListFilter<'a> {
    pub fn search(term: &'a str) -> Self {
        Self {
            search: Some(term),
            status: None,
        }
    }
}

/// Operaciones de lectura y borrado, siempre filtradas por tenant
#[async_trait]
pub trait ResourceRepository<R: Resource>: Send + Sync {
    /// Lista paginada ordenada por `updated_at` descendente; `filter.search`
    /// filtra por subcadena sin distinguir mayúsculas.
    async fn list(&self, tenant_id: Uuid, filter: ListFilter<'_>, page: PageRequest) -> AppResult<Page<R>>;

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> AppResult<Option<R>>;

    /// Devuelve `false` si no había fila que borrar
    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> AppResult<bool>;
}

/// Valor tipado de una columna escrita por `ResourceWriter`
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(String),
    Int(i32),
    Date(NaiveDate),
}

/// Columnas presentes en el body, en orden de declaración
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns(Vec<(&'static str, Column)>);

impl Columns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &'static str, value: &Option<String>) -> Self {
        if let Some(value) = value {
            self.0.push((name, Column::Text(value.clone())));
        }
        self
    }

    pub fn int(mut self, name: &'static str, value: Option<i32>) -> Self {
        if let Some(value) = value {
            self.0.push((name, Column::Int(value)));
        }
        self
    }

    pub fn date(mut self, name: &'static str, value: Option<NaiveDate>) -> Self {
        if let Some(value) = value {
            self.0.push((name, Column::Date(value)));
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(column, _)| *column == name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, Column)> {
        self.0.iter()
    }
}

impl IntoIterator for Columns {
    type Item = (&'static str, Column);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Recurso que admite POST/PATCH fuera del flujo de órdenes
pub trait Writable: Resource + DeserializeOwned {
    /// Body aceptado por POST y PATCH
    type Input: DeserializeOwned + Validate + Send + Sync + 'static;

    /// Columnas NOT NULL sin valor por defecto
    const REQUIRED: &'static [&'static str];
    /// Clave foránea hacia el cliente en las tablas hijas
    const PARENT_COLUMN: Option<&'static str> = None;

    fn columns(input: &Self::Input) -> Columns;

    fn writer(repositories: &Repositories) -> Arc<dyn ResourceWriter<Self>>;
}

/// Escrituras sueltas de un recurso, acotadas al tenant del actor
#[async_trait]
pub trait ResourceWriter<R: Writable>: Send + Sync {
    /// Inserta la fila; `parent_id` rellena `PARENT_COLUMN`
    async fn create(&self, actor: &AuthenticatedUser, parent_id: Option<Uuid>, columns: Columns) -> AppResult<R>;

    /// Actualiza sólo las columnas recibidas; `None` si el id no es del tenant
    async fn patch(&self, actor: &AuthenticatedUser, id: Uuid, columns: Columns) -> AppResult<Option<R>>;

    /// Filas de un cliente en orden de creación
    async fn list_by_parent(&self, tenant_id: Uuid, parent_id: Uuid) -> AppResult<Vec<R>>;
}

/// Vínculo muchos a muchos entre clientes y vehículos
#[async_trait]
pub trait CustomerVehicleRepository: Send + Sync {
    async fn vehicles_of(&self, tenant_id: Uuid, customer_id: Uuid) -> AppResult<Vec<Vehicle>>;

    async fn customers_of(&self, tenant_id: Uuid, vehicle_id: Uuid) -> AppResult<Vec<Customer>>;

    /// Crea el vehículo y lo vincula al cliente en una sola transacción
    async fn create_vehicle_for(
        &self,
        actor: &AuthenticatedUser,
        customer_id: Uuid,
        columns: Columns,
    ) -> AppResult<Vehicle>;
}

/// Almacén transaccional de órdenes de servicio
#[async_trait]
pub trait ServiceOrderStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn ServiceOrderTx>>;

    async fn find_detail(&self, tenant_id: Uuid, id: Uuid) -> AppResult<Option<ServiceOrderDetail>>;
}

/// Transacción abierta del flujo de upsert.
///
/// Cada `upsert_*` actualiza la fila del tenant si el id existe y si no la
/// inserta. Un id que pertenece a otro tenant es un error `Forbidden`.
#[async_trait]
pub trait ServiceOrderTx: Send {
    async fn upsert_customer(&mut self, actor: &AuthenticatedUser, input: &CustomerInput) -> AppResult<Customer>;

    async fn upsert_vehicle(&mut self, actor: &AuthenticatedUser, input: &VehicleInput) -> AppResult<Vehicle>;

    async fn upsert_service_order(
        &mut self,
        actor: &AuthenticatedUser,
        changes: &ServiceOrderChanges,
    ) -> AppResult<ServiceOrder>;

    async fn upsert_item(
        &mut self,
        actor: &AuthenticatedUser,
        service_order_id: Uuid,
        input: &ServiceOrderItemInput,
    ) -> AppResult<ServiceOrderItem>;

    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Repositorios inyectados en el estado de la aplicación
#[derive(Clone)]
pub struct Repositories {
    pub service_orders: Arc<dyn ServiceOrderStore>,
    pub customers: Arc<dyn ResourceRepository<Customer>>,
    pub vehicles: Arc<dyn ResourceRepository<Vehicle>>,
    pub service_order_rows: Arc<dyn ResourceRepository<ServiceOrder>>,
    pub service_order_items: Arc<dyn ResourceRepository<ServiceOrderItem>>,
    pub catalog: Arc<dyn ResourceRepository<CatalogItem>>,
    pub employees: Arc<dyn ResourceRepository<Employee>>,
    pub suppliers: Arc<dyn ResourceRepository<Supplier>>,
    pub contacts: Arc<dyn ResourceRepository<Contact>>,
    pub documents: Arc<dyn ResourceRepository<Document>>,
    pub addresses: Arc<dyn ResourceRepository<Address>>,
    pub customer_writer: Arc<dyn ResourceWriter<Customer>>,
    pub vehicle_writer: Arc<dyn ResourceWriter<Vehicle>>,
    pub contact_writer: Arc<dyn ResourceWriter<Contact>>,
    pub document_writer: Arc<dyn ResourceWriter<Document>>,
    pub address_writer: Arc<dyn ResourceWriter<Address>>,
    pub customer_vehicles: Arc<dyn CustomerVehicleRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            service_orders: Arc::new(PgServiceOrderStore::new(pool.clone())),
            customers: Arc::new(PgResourceRepository::new(pool.clone())),
            vehicles: Arc::new(PgResourceRepository::new(pool.clone())),
            service_order_rows: Arc::new(PgResourceRepository::new(pool.clone())),
            service_order_items: Arc::new(PgResourceRepository::new(pool.clone())),
            catalog: Arc::new(PgResourceRepository::new(pool.clone())),
            employees: Arc::new(PgResourceRepository::new(pool.clone())),
            suppliers: Arc::new(PgResourceRepository::new(pool.clone())),
            contacts: Arc::new(PgResourceRepository::new(pool.clone())),
            documents: Arc::new(PgResourceRepository::new(pool.clone())),
            addresses: Arc::new(PgResourceRepository::new(pool.clone())),
            customer_writer: Arc::new(PgResourceRepository::new(pool.clone())),
            vehicle_writer: Arc::new(PgResourceRepository::new(pool.clone())),
            contact_writer: Arc::new(PgResourceRepository::new(pool.clone())),
            document_writer: Arc::new(PgResourceRepository::new(pool.clone())),
            address_writer: Arc::new(PgResourceRepository::new(pool.clone())),
            customer_vehicles: Arc::new(PgCustomerVehicleRepository::new(pool)),
        }
    }

    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            service_orders: store.clone(),
            customers: store.clone(),
            vehicles: store.clone(),
            service_order_rows: store.clone(),
            service_order_items: store.clone(),
            catalog: store.clone(),
            employees: store.clone(),
            suppliers: store.clone(),
            contacts: store.clone(),
            documents: store.clone(),
            addresses: store.clone(),
            customer_writer: store.clone(),
            vehicle_writer: store.clone(),
            contact_writer: store.clone(),
            document_writer: store.clone(),
            address_writer: store.clone(),
            customer_vehicles: store,
        }
    }
}

/// Término de búsqueda útil o `None` si viene vacío
pub(crate) fn normalize_search(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|term| !term.is_empty())
}
