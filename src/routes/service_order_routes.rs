use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::controllers::service_order_controller::ServiceOrderController;
use crate::dto::ServiceOrderRequest;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{ServiceOrder, ServiceOrderDetail};
use crate::routes::resource_routes::{delete_resource, list_resources};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_service_order_router() -> Router<AppState> {
    Router::new()
        .route("/", post(upsert_service_order).get(list_resources::<ServiceOrder>))
        .route(
            "/:id",
            get(get_service_order).delete(delete_resource::<ServiceOrder>),
        )
}

async fn upsert_service_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Json(request), _): WithRejection<Json<ServiceOrderRequest>, AppError>,
) -> Result<Json<ServiceOrderDetail>, AppError> {
    let controller = ServiceOrderController::new(state.repositories.clone());
    let response = controller.upsert(user, request).await?;
    Ok(Json(response))
}

async fn get_service_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<ServiceOrderDetail>, AppError> {
    let controller = ServiceOrderController::new(state.repositories.clone());
    let response = controller.get(user, id).await?;
    Ok(Json(response))
}
