//! Router genérico de recursos
//!
//! Cada entidad que implementa `Resource` obtiene listado, búsqueda, lectura
//! y borrado filtrados por el tenant del token. `Operations` decide qué
//! endpoints se montan; `write_routes` añade POST y PATCH a los `Writable`.
//! Los extractores van envueltos en `WithRejection` para que un body, query o
//! path mal formado responda con el mismo JSON de error que el resto.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, MethodRouter},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{ListQuery, PageRequest, PageResponse};
use crate::middleware::auth::AuthenticatedUser;
use crate::repositories::{Columns, ListFilter, Resource, Writable};
use crate::state::AppState;
use crate::utils::errors::{bad_request_error, not_found_error, AppError, AppResult};

/// Endpoints habilitados para un recurso
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operations {
    pub list: bool,
    pub get: bool,
    pub search: bool,
    pub delete: bool,
}

impl Operations {
    pub const ALL: Self = Self {
        list: true,
        get: true,
        search: true,
        delete: true,
    };

    pub const GET_DELETE: Self = Self {
        list: false,
        get: true,
        search: false,
        delete: true,
    };

    pub const NO_SEARCH: Self = Self {
        list: true,
        get: true,
        search: false,
        delete: true,
    };
}

pub fn resource_router<R: Resource>(operations: Operations) -> Router<AppState> {
    let mut router = Router::new();

    if operations.list {
        router = router.route("/", get(list_resources::<R>));
    }
    if operations.search {
        router = router.route("/search", get(search_resources::<R>));
    }

    if operations.get || operations.delete {
        let mut by_id = MethodRouter::new();
        if operations.get {
            by_id = by_id.get(get_resource::<R>);
        }
        if operations.delete {
            by_id = by_id.delete(delete_resource::<R>);
        }
        router = router.route("/:id", by_id);
    }

    router
}

/// `PATCH /:id` y, si `create`, `POST /`; se combina con `resource_router`
pub fn write_routes<R: Writable>(create: bool) -> Router<AppState> {
    let router = Router::new().route("/:id", patch(patch_resource::<R>));
    if create {
        router.route("/", post(create_resource::<R>))
    } else {
        router
    }
}

pub async fn list_resources<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, AppError>,
) -> Result<Json<PageResponse<R>>, AppError> {
    let page = PageRequest::from(&query);
    let result = R::repository(&state.repositories)
        .list(user.tenant_id, ListFilter::default(), page)
        .await?;
    Ok(Json(PageResponse::new(result, page)))
}

pub async fn search_resources<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, AppError>,
) -> Result<Json<PageResponse<R>>, AppError> {
    let page = PageRequest::from(&query);
    let filter = ListFilter {
        search: query.search.as_deref(),
        status: status_filter::<R>(query.status.as_deref()),
    };
    let result = R::repository(&state.repositories)
        .list(user.tenant_id, filter, page)
        .await?;
    Ok(Json(PageResponse::new(result, page)))
}

/// Estado pedido o el de por defecto del recurso; vacío desactiva el filtro
fn status_filter<R: Resource>(requested: Option<&str>) -> Option<&str> {
    let (_, default) = R::STATUS_FILTER?;
    let status = requested.unwrap_or(default).trim();
    (!status.is_empty()).then_some(status)
}

pub async fn get_resource<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<R>, AppError> {
    let row = R::repository(&state.repositories)
        .find_by_id(user.tenant_id, id)
        .await?
        .ok_or_else(|| not_found_error(R::NAME, &id.to_string()))?;
    Ok(Json(row))
}

pub async fn delete_resource<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<StatusCode, AppError> {
    let deleted = R::repository(&state.repositories)
        .delete(user.tenant_id, id)
        .await?;

    if !deleted {
        return Err(not_found_error(R::NAME, &id.to_string()));
    }

    info!("🗑️ {} {} eliminado (tenant {})", R::NAME, id, user.tenant_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_resource<R: Writable>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Json(input), _): WithRejection<Json<R::Input>, AppError>,
) -> Result<(StatusCode, Json<R>), AppError> {
    let columns = insert_columns::<R>(&input)?;
    let row = R::writer(&state.repositories)
        .create(&user, None, columns)
        .await?;

    info!("✨ {} {} creado (tenant {})", R::NAME, row.id(), user.tenant_id);
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn patch_resource<R: Writable>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(input), _): WithRejection<Json<R::Input>, AppError>,
) -> Result<Json<R>, AppError> {
    input.validate()?;
    let row = R::writer(&state.repositories)
        .patch(&user, id, R::columns(&input))
        .await?
        .ok_or_else(|| not_found_error(R::NAME, &id.to_string()))?;
    Ok(Json(row))
}

/// Valida el body de un alta y exige las columnas obligatorias
pub(crate) fn insert_columns<R: Writable>(input: &R::Input) -> AppResult<Columns> {
    input.validate()?;
    let columns = R::columns(input);
    if let Some(missing) = R::REQUIRED.iter().find(|column| !columns.contains(column)) {
        return Err(bad_request_error(&format!("{} {} is required", R::NAME, missing)));
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{ContactInput, CustomerInput};
    use crate::models::{Contact, Customer, Vehicle};

    #[test]
    fn test_status_filter_defaults_and_disables() {
        assert_eq!(status_filter::<Customer>(None), Some("active"));
        assert_eq!(status_filter::<Customer>(Some("inactive")), Some("inactive"));
        assert_eq!(status_filter::<Customer>(Some("")), None);
        assert_eq!(status_filter::<Vehicle>(Some("active")), None);
    }

    #[test]
    fn test_insert_columns_requires_mandatory_fields() {
        let missing_name = CustomerInput {
            email: Some("ana@example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            insert_columns::<Customer>(&missing_name),
            Err(AppError::BadRequest(_))
        ));

        let contact = ContactInput {
            contact_type: Some("mobile".to_string()),
            number: Some("555".to_string()),
        };
        assert!(insert_columns::<Contact>(&contact).is_ok());
    }
}
