//! Repositorios PostgreSQL
//!
//! `PgResourceRepository<R>` genera las consultas a partir del descriptor
//! `Resource`. `PgServiceOrderStore` abre la transacción del flujo de upsert.
//! Los upserts hacen primero un UPDATE acotado al tenant y, si no afecta a
//! ninguna fila, un INSERT con `ON CONFLICT (id) DO NOTHING`: si tampoco
//! devuelve fila, el id pertenece a otro tenant.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::marker::PhantomData;
use tracing::debug;
use uuid::Uuid;

use super::{
    normalize_search, Column, Columns, CustomerVehicleRepository, ListFilter, Resource,
    ResourceRepository, ResourceWriter, ServiceOrderStore, ServiceOrderTx, Writable,
};
use crate::dto::{CustomerInput, Page, PageRequest, ServiceOrderItemInput, VehicleInput};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    CatalogItem, Customer, ServiceOrder, ServiceOrderChanges, ServiceOrderDetail, ServiceOrderItem,
    Vehicle,
};
use crate::utils::errors::{cross_tenant_error, AppError, AppResult};

pub struct PgResourceRepository<R> {
    pool: PgPool,
    _resource: PhantomData<fn() -> R>,
}

impl<R> PgResourceRepository<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _resource: PhantomData,
        }
    }
}

/// `WHERE` común de listados: tenant en $1, búsqueda en $2 y estado en $3
fn list_filter<R: Resource>() -> String {
    let mut matches: Vec<String> = R::SEARCH_COLUMNS
        .iter()
        .map(|column| format!("{} ILIKE $2", column))
        .collect();
    matches.extend(R::RELATED_SEARCH.iter().map(|(table, foreign_key, column)| {
        format!(
            "EXISTS (SELECT 1 FROM {table} r WHERE r.{foreign_key} = {parent}.id AND r.{column} ILIKE $2)",
            table = table,
            foreign_key = foreign_key,
            parent = R::TABLE,
            column = column
        )
    }));

    let search = if matches.is_empty() {
        "$2::text IS NULL".to_string()
    } else {
        format!("($2::text IS NULL OR {})", matches.join(" OR "))
    };
    let status = match R::STATUS_FILTER {
        Some((column, _)) => format!("($3::text IS NULL OR {} = $3)", column),
        None => "$3::text IS NULL".to_string(),
    };
    format!("tenant_id = $1 AND {} AND {}", search, status)
}

/// Patrón ILIKE de subcadena con los comodines escapados
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl<R: Resource> ResourceRepository<R> for PgResourceRepository<R> {
    async fn list(&self, tenant_id: Uuid, filter: ListFilter<'_>, page: PageRequest) -> AppResult<Page<R>> {
        let conditions = list_filter::<R>();
        let pattern = normalize_search(filter.search).map(like_pattern);

        let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {}", R::TABLE, conditions);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(tenant_id)
            .bind(&pattern)
            .bind(filter.status)
            .fetch_one(&self.pool)
            .await?;

        let select_sql = format!(
            "SELECT * FROM {} WHERE {} ORDER BY updated_at DESC, id LIMIT $4 OFFSET $5",
            R::TABLE,
            conditions
        );
        let items = sqlx::query_as::<_, R>(&select_sql)
            .bind(tenant_id)
            .bind(&pattern)
            .bind(filter.status)
            .bind(i64::from(page.limit))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total: total.max(0) as u64,
        })
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> AppResult<Option<R>> {
        let sql = format!("SELECT * FROM {} WHERE id = $1 AND tenant_id = $2", R::TABLE);
        let row = sqlx::query_as::<_, R>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> AppResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1 AND tenant_id = $2", R::TABLE);
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn push_column(builder: &mut QueryBuilder<'static, Postgres>, value: Column) {
    match value {
        Column::Text(text) => builder.push_bind(text),
        Column::Int(number) => builder.push_bind(number),
        Column::Date(date) => builder.push_bind(date),
    };
}

/// `INSERT ... RETURNING *` con las columnas recibidas; el resto toma el
/// valor por defecto de la tabla.
fn insert_query<R: Writable>(
    actor: &AuthenticatedUser,
    parent_id: Option<Uuid>,
    columns: Columns,
) -> AppResult<QueryBuilder<'static, Postgres>> {
    let parent = match (R::PARENT_COLUMN, parent_id) {
        (Some(column), Some(id)) => Some((column, id)),
        (None, _) => None,
        (Some(column), None) => {
            return Err(AppError::Internal(format!("{} requires {}", R::NAME, column)));
        }
    };

    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} (id, tenant_id, created_by, created_at, updated_at",
        R::TABLE
    ));
    if let Some((column, _)) = parent {
        builder.push(", ").push(column);
    }
    for (name, _) in columns.iter() {
        builder.push(", ").push(*name);
    }

    builder.push(") VALUES (");
    builder
        .push_bind(Uuid::new_v4())
        .push(", ")
        .push_bind(actor.tenant_id)
        .push(", ")
        .push_bind(actor.user_id)
        .push(", NOW(), NOW()");
    if let Some((_, id)) = parent {
        builder.push(", ").push_bind(id);
    }
    for (_, value) in columns {
        builder.push(", ");
        push_column(&mut builder, value);
    }
    builder.push(") RETURNING *");
    Ok(builder)
}

/// `UPDATE ... RETURNING *` acotado al tenant del actor
fn update_query<R: Writable>(actor: &AuthenticatedUser, id: Uuid, columns: Columns) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "UPDATE {} SET updated_at = NOW(), updated_by = ",
        R::TABLE
    ));
    builder.push_bind(actor.user_id);
    for (name, value) in columns {
        builder.push(", ").push(name).push(" = ");
        push_column(&mut builder, value);
    }
    builder
        .push(" WHERE id = ")
        .push_bind(id)
        .push(" AND tenant_id = ")
        .push_bind(actor.tenant_id)
        .push(" RETURNING *");
    builder
}

#[async_trait]
impl<R: Writable> ResourceWriter<R> for PgResourceRepository<R> {
    async fn create(&self, actor: &AuthenticatedUser, parent_id: Option<Uuid>, columns: Columns) -> AppResult<R> {
        let mut builder = insert_query::<R>(actor, parent_id, columns)?;
        let row = builder.build_query_as::<R>().fetch_one(&self.pool).await?;
        Ok(row)
    }

    async fn patch(&self, actor: &AuthenticatedUser, id: Uuid, columns: Columns) -> AppResult<Option<R>> {
        let mut builder = update_query::<R>(actor, id, columns);
        let row = builder.build_query_as::<R>().fetch_optional(&self.pool).await?;
        Ok(row)
    }

    async fn list_by_parent(&self, tenant_id: Uuid, parent_id: Uuid) -> AppResult<Vec<R>> {
        let Some(column) = R::PARENT_COLUMN else {
            return Err(AppError::Internal(format!("{} has no parent column", R::NAME)));
        };
        let sql = format!(
            "SELECT * FROM {} WHERE {} = $1 AND tenant_id = $2 ORDER BY created_at, id",
            R::TABLE,
            column
        );
        let rows = sqlx::query_as::<_, R>(&sql)
            .bind(parent_id)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

pub struct PgCustomerVehicleRepository {
    pool: PgPool,
}

impl PgCustomerVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerVehicleRepository for PgCustomerVehicleRepository {
    async fn vehicles_of(&self, tenant_id: Uuid, customer_id: Uuid) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT v.* FROM vehicles v
            JOIN customer_vehicles cv ON cv.vehicle_id = v.id
            WHERE cv.customer_id = $1 AND v.tenant_id = $2
            ORDER BY cv.created_at, v.id
            "#,
        )
        .bind(customer_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(vehicles)
    }

    async fn customers_of(&self, tenant_id: Uuid, vehicle_id: Uuid) -> AppResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT c.* FROM customers c
            JOIN customer_vehicles cv ON cv.customer_id = c.id
            WHERE cv.vehicle_id = $1 AND c.tenant_id = $2
            ORDER BY cv.created_at, c.id
            "#,
        )
        .bind(vehicle_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }

    async fn create_vehicle_for(
        &self,
        actor: &AuthenticatedUser,
        customer_id: Uuid,
        columns: Columns,
    ) -> AppResult<Vehicle> {
        let mut tx = self.pool.begin().await?;

        let mut builder = insert_query::<Vehicle>(actor, None, columns)?;
        let vehicle = builder
            .build_query_as::<Vehicle>()
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO customer_vehicles (customer_id, vehicle_id, tenant_id) VALUES ($1, $2, $3)")
            .bind(customer_id)
            .bind(vehicle.id)
            .bind(actor.tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("🚗 Vehículo {} vinculado al cliente {}", vehicle.id, customer_id);
        Ok(vehicle)
    }
}

pub struct PgServiceOrderStore {
    pool: PgPool,
}

impl PgServiceOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceOrderStore for PgServiceOrderStore {
    async fn begin(&self) -> AppResult<Box<dyn ServiceOrderTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgServiceOrderTx { tx }))
    }

    async fn find_detail(&self, tenant_id: Uuid, id: Uuid) -> AppResult<Option<ServiceOrderDetail>> {
        let service_order = sqlx::query_as::<_, ServiceOrder>(
            "SELECT * FROM service_orders WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(service_order) = service_order else {
            return Ok(None);
        };

        let service_order_items = sqlx::query_as::<_, ServiceOrderItem>(
            r#"
            SELECT * FROM service_order_items
            WHERE service_order_id = $1 AND tenant_id = $2
            ORDER BY position
            "#,
        )
        .bind(service_order.id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(service_order.customer_id)
            .fetch_one(&self.pool)
            .await?;

        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = $1")
            .bind(service_order.vehicle_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Some(ServiceOrderDetail {
            service_order,
            service_order_items,
            customer,
            vehicle,
        }))
    }
}

pub struct PgServiceOrderTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ServiceOrderTx for PgServiceOrderTx {
    async fn upsert_customer(&mut self, actor: &AuthenticatedUser, input: &CustomerInput) -> AppResult<Customer> {
        if let Some(id) = input.id {
            let updated = sqlx::query_as::<_, Customer>(
                r#"
                UPDATE customers SET
                    name = COALESCE($3, name),
                    email = COALESCE($4, email),
                    document = COALESCE($5, document),
                    phone = COALESCE($6, phone),
                    status = COALESCE($7, status),
                    birthdate = COALESCE($8, birthdate),
                    note = COALESCE($9, note),
                    updated_by = $10,
                    updated_at = NOW()
                WHERE id = $1 AND tenant_id = $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(actor.tenant_id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.document)
            .bind(&input.phone)
            .bind(&input.status)
            .bind(input.birthdate)
            .bind(&input.note)
            .bind(actor.user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

            if let Some(customer) = updated {
                debug!(customer_id = %customer.id, "customer updated");
                return Ok(customer);
            }
        }

        let id = input.id.unwrap_or_else(Uuid::new_v4);
        let inserted = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (
                id, tenant_id, name, email, document, phone, status, birthdate, note,
                created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'active'), $8, $9, $10, NOW(), NOW())
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(actor.tenant_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.document)
        .bind(&input.phone)
        .bind(&input.status)
        .bind(input.birthdate)
        .bind(&input.note)
        .bind(actor.user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        inserted.ok_or_else(|| cross_tenant_error(Customer::NAME, &id.to_string()))
    }

    async fn upsert_vehicle(&mut self, actor: &AuthenticatedUser, input: &VehicleInput) -> AppResult<Vehicle> {
        if let Some(id) = input.id {
            let updated = sqlx::query_as::<_, Vehicle>(
                r#"
                UPDATE vehicles SET
                    plate = COALESCE($3, plate),
                    brand = COALESCE($4, brand),
                    model = COALESCE($5, model),
                    year = COALESCE($6, year),
                    color = COALESCE($7, color),
                    km = COALESCE($8, km),
                    fuel = COALESCE($9, fuel),
                    chassis = COALESCE($10, chassis),
                    updated_by = $11,
                    updated_at = NOW()
                WHERE id = $1 AND tenant_id = $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(actor.tenant_id)
            .bind(&input.plate)
            .bind(&input.brand)
            .bind(&input.model)
            .bind(input.year)
            .bind(&input.color)
            .bind(&input.km)
            .bind(&input.fuel)
            .bind(&input.chassis)
            .bind(actor.user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

            if let Some(vehicle) = updated {
                debug!(vehicle_id = %vehicle.id, "vehicle updated");
                return Ok(vehicle);
            }
        }

        let id = input.id.unwrap_or_else(Uuid::new_v4);
        let inserted = sqlx::query_as::<_, Vehicle>(
            r#"
            INSERT INTO vehicles (
                id, tenant_id, plate, brand, model, year, color, km, fuel, chassis,
                created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(actor.tenant_id)
        .bind(&input.plate)
        .bind(&input.brand)
        .bind(&input.model)
        .bind(input.year)
        .bind(&input.color)
        .bind(&input.km)
        .bind(&input.fuel)
        .bind(&input.chassis)
        .bind(actor.user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        inserted.ok_or_else(|| cross_tenant_error(Vehicle::NAME, &id.to_string()))
    }

    async fn upsert_service_order(
        &mut self,
        actor: &AuthenticatedUser,
        changes: &ServiceOrderChanges,
    ) -> AppResult<ServiceOrder> {
        if let Some(id) = changes.id {
            let updated = sqlx::query_as::<_, ServiceOrder>(
                r#"
                UPDATE service_orders SET
                    status = COALESCE($3, status),
                    customer_id = $4,
                    vehicle_id = $5,
                    insurance_company_id = COALESCE($6, insurance_company_id),
                    start_at = COALESCE($7, start_at),
                    end_at = COALESCE($8, end_at),
                    note = COALESCE($9, note),
                    updated_by = $10,
                    updated_at = NOW()
                WHERE id = $1 AND tenant_id = $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(actor.tenant_id)
            .bind(&changes.status)
            .bind(changes.customer_id)
            .bind(changes.vehicle_id)
            .bind(changes.insurance_company_id)
            .bind(changes.start_at)
            .bind(changes.end_at)
            .bind(&changes.note)
            .bind(actor.user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

            if let Some(service_order) = updated {
                debug!(service_order_id = %service_order.id, "service order updated");
                return Ok(service_order);
            }
        }

        let id = changes.id.unwrap_or_else(Uuid::new_v4);
        let inserted = sqlx::query_as::<_, ServiceOrder>(
            r#"
            INSERT INTO service_orders (
                id, tenant_id, status, customer_id, vehicle_id, insurance_company_id,
                start_at, end_at, note, created_by, created_at, updated_at
            )
            VALUES ($1, $2, COALESCE($3, 'pending'), $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(actor.tenant_id)
        .bind(&changes.status)
        .bind(changes.customer_id)
        .bind(changes.vehicle_id)
        .bind(changes.insurance_company_id)
        .bind(changes.start_at)
        .bind(changes.end_at)
        .bind(&changes.note)
        .bind(actor.user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        inserted.ok_or_else(|| cross_tenant_error(ServiceOrder::NAME, &id.to_string()))
    }

    async fn upsert_item(
        &mut self,
        actor: &AuthenticatedUser,
        service_order_id: Uuid,
        input: &ServiceOrderItemInput,
    ) -> AppResult<ServiceOrderItem> {
        if let Some(catalog_item_id) = input.catalog_item_id {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM catalog WHERE id = $1 AND tenant_id = $2)",
            )
            .bind(catalog_item_id)
            .bind(actor.tenant_id)
            .fetch_one(&mut *self.tx)
            .await?;

            if !exists {
                return Err(AppError::Persistence(format!(
                    "{} '{}' referenced by service order item does not exist",
                    CatalogItem::NAME,
                    catalog_item_id
                )));
            }
        }

        if let Some(id) = input.id {
            let updated = sqlx::query_as::<_, ServiceOrderItem>(
                r#"
                UPDATE service_order_items SET
                    service_order_id = $3,
                    catalog_item_id = COALESCE($4, catalog_item_id),
                    description = COALESCE($5, description),
                    value = COALESCE($6::numeric, value),
                    quantity = COALESCE($7::integer, quantity),
                    discount = COALESCE($8::numeric, discount),
                    total = COALESCE(
                        $9::numeric,
                        COALESCE($6::numeric, value) * COALESCE($7::integer, quantity)
                            - COALESCE($8::numeric, discount, 0)
                    ),
                    type = COALESCE($10, type),
                    updated_by = $11,
                    updated_at = NOW()
                WHERE id = $1 AND tenant_id = $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(actor.tenant_id)
            .bind(service_order_id)
            .bind(input.catalog_item_id)
            .bind(&input.description)
            .bind(input.value)
            .bind(input.quantity)
            .bind(input.discount)
            .bind(input.total)
            .bind(&input.item_type)
            .bind(actor.user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

            if let Some(item) = updated {
                return Ok(item);
            }
        }

        let id = input.id.unwrap_or_else(Uuid::new_v4);
        let inserted = sqlx::query_as::<_, ServiceOrderItem>(
            r#"
            INSERT INTO service_order_items (
                id, tenant_id, service_order_id, catalog_item_id, description, value,
                quantity, discount, total, type, created_by, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6::numeric,
                COALESCE($7::integer, 1),
                $8::numeric,
                COALESCE($9::numeric, $6::numeric * COALESCE($7::integer, 1) - COALESCE($8::numeric, 0)),
                COALESCE($10, 'parts'),
                $11, NOW(), NOW()
            )
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(actor.tenant_id)
        .bind(service_order_id)
        .bind(input.catalog_item_id)
        .bind(&input.description)
        .bind(input.value)
        .bind(input.quantity)
        .bind(input.discount)
        .bind(input.total)
        .bind(&input.item_type)
        .bind(actor.user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        inserted.ok_or_else(|| cross_tenant_error(ServiceOrderItem::NAME, &id.to_string()))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
