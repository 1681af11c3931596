//! Rutas de clientes y vehículos
//!
//! Además del CRUD genérico, un cliente expone sus contactos, documentos,
//! direcciones y vehículos vinculados como subrecursos.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use crate::dto::VehicleInput;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{Address, Contact, Customer, Document, Vehicle};
use crate::repositories::{Resource, Writable};
use crate::routes::resource_routes::{insert_columns, resource_router, write_routes, Operations};
use crate::state::AppState;
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub fn create_customer_router() -> Router<AppState> {
    resource_router::<Customer>(Operations::ALL)
        .merge(write_routes::<Customer>(true))
        .route(
            "/:id/vehicles",
            get(customer_vehicles).post(create_customer_vehicle),
        )
        .route(
            "/:id/contacts",
            get(list_children::<Contact>).post(create_child::<Contact>),
        )
        .route(
            "/:id/documents",
            get(list_children::<Document>).post(create_child::<Document>),
        )
        .route(
            "/:id/addresses",
            get(list_children::<Address>).post(create_child::<Address>),
        )
}

pub fn create_vehicle_router() -> Router<AppState> {
    resource_router::<Vehicle>(Operations::ALL)
        .merge(write_routes::<Vehicle>(false))
        .route("/:id/customers", get(vehicle_customers))
}

/// Contactos, documentos y direcciones: se crean desde el cliente
pub fn create_customer_detail_router<R: Writable>() -> Router<AppState> {
    resource_router::<R>(Operations::NO_SEARCH).merge(write_routes::<R>(false))
}

async fn ensure_exists<R: Resource>(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> AppResult<R> {
    R::repository(&state.repositories)
        .find_by_id(user.tenant_id, id)
        .await?
        .ok_or_else(|| not_found_error(R::NAME, &id.to_string()))
}

async fn list_children<R: Writable>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(customer_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<Vec<R>>, AppError> {
    ensure_exists::<Customer>(&state, &user, customer_id).await?;
    let rows = R::writer(&state.repositories)
        .list_by_parent(user.tenant_id, customer_id)
        .await?;
    Ok(Json(rows))
}

async fn create_child<R: Writable>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(customer_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(input), _): WithRejection<Json<R::Input>, AppError>,
) -> Result<(StatusCode, Json<R>), AppError> {
    ensure_exists::<Customer>(&state, &user, customer_id).await?;
    let columns = insert_columns::<R>(&input)?;
    let row = R::writer(&state.repositories)
        .create(&user, Some(customer_id), columns)
        .await?;

    info!("📇 {} {} añadido al cliente {}", R::NAME, row.id(), customer_id);
    Ok((StatusCode::CREATED, Json(row)))
}

async fn customer_vehicles(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(customer_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    ensure_exists::<Customer>(&state, &user, customer_id).await?;
    let vehicles = state
        .repositories
        .customer_vehicles
        .vehicles_of(user.tenant_id, customer_id)
        .await?;
    Ok(Json(vehicles))
}

async fn create_customer_vehicle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(customer_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(input), _): WithRejection<Json<VehicleInput>, AppError>,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    ensure_exists::<Customer>(&state, &user, customer_id).await?;
    let columns = insert_columns::<Vehicle>(&input)?;
    let vehicle = state
        .repositories
        .customer_vehicles
        .create_vehicle_for(&user, customer_id, columns)
        .await?;

    info!("🚗 Vehículo {} creado para el cliente {}", vehicle.id, customer_id);
    Ok((StatusCode::CREATED, Json(vehicle)))
}

async fn vehicle_customers(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(vehicle_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<Vec<Customer>>, AppError> {
    ensure_exists::<Vehicle>(&state, &user, vehicle_id).await?;
    let customers = state
        .repositories
        .customer_vehicles
        .customers_of(user.tenant_id, vehicle_id)
        .await?;
    Ok(Json(customers))
}
