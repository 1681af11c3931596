//! Workshop API
//!
//! API REST multi-tenant para talleres mecánicos: clientes con sus datos de
//! contacto, vehículos, órdenes de servicio con sus items, catálogo,
//! empleados y proveedores.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod utils;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::{auth::auth_middleware, cors::cors_middleware};
use crate::models::{Address, CatalogItem, Contact, Document, Employee, ServiceOrderItem, Supplier};
use crate::routes::customer_routes::{
    create_customer_detail_router, create_customer_router, create_vehicle_router,
};
use crate::routes::resource_routes::{resource_router, Operations};
use crate::routes::service_order_routes::create_service_order_router;
use crate::state::AppState;

/// Router completo de la aplicación
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/service_orders", create_service_order_router())
        .nest("/service_order_items", resource_router::<ServiceOrderItem>(Operations::GET_DELETE))
        .nest("/customers", create_customer_router())
        .nest("/vehicles", create_vehicle_router())
        .nest("/contacts", create_customer_detail_router::<Contact>())
        .nest("/documents", create_customer_detail_router::<Document>())
        .nest("/addresses", create_customer_detail_router::<Address>())
        .nest("/catalog", resource_router::<CatalogItem>(Operations::ALL))
        .nest("/employees", resource_router::<Employee>(Operations::ALL))
        .nest("/suppliers", resource_router::<Supplier>(Operations::ALL))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(health_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors_middleware(&state.config))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "Workshop API running successfully!"
}
