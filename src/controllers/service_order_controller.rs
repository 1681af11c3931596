use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::dto::{CustomerInput, ServiceOrderRequest, VehicleInput};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{ServiceOrder, ServiceOrderChanges, ServiceOrderDetail, ServiceOrderItem};
use crate::repositories::{Repositories, Resource, ServiceOrderTx};
use crate::utils::errors::{bad_request_error, not_found_error, AppError, AppResult};

pub struct ServiceOrderController {
    repositories: Repositories,
}

impl ServiceOrderController {
    pub fn new(repositories: Repositories) -> Self {
        Self { repositories }
    }

    /// Crea o actualiza cliente, vehículo, orden e items en una sola transacción
    pub async fn upsert(
        &self,
        actor: AuthenticatedUser,
        request: ServiceOrderRequest,
    ) -> AppResult<ServiceOrderDetail> {
        // Validar antes de abrir la transacción
        let (customer, vehicle) = validate_request(&request)?;

        let store = &self.repositories.service_orders;
        let mut tx = store.begin().await?;

        match apply(tx.as_mut(), &actor, &request, customer, vehicle).await {
            Ok(detail) => {
                tx.commit().await?;
                info!(
                    "🧾 Orden de servicio {} guardada (tenant {}, {} items)",
                    detail.service_order.id,
                    actor.tenant_id,
                    detail.service_order_items.len()
                );
                Ok(detail)
            }
            Err(error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!("⚠️ Rollback fallido: {}", rollback_error);
                }
                Err(error)
            }
        }
    }

    pub async fn get(&self, actor: AuthenticatedUser, id: Uuid) -> AppResult<ServiceOrderDetail> {
        self.repositories
            .service_orders
            .find_detail(actor.tenant_id, id)
            .await?
            .ok_or_else(|| not_found_error(ServiceOrder::NAME, &id.to_string()))
    }
}

fn validate_request(request: &ServiceOrderRequest) -> AppResult<(&CustomerInput, &VehicleInput)> {
    let customer = request
        .customer
        .as_ref()
        .filter(|customer| !customer.is_blank())
        .ok_or_else(|| bad_request_error("Customer is required"))?;
    let vehicle = request
        .vehicle
        .as_ref()
        .filter(|vehicle| !vehicle.is_blank())
        .ok_or_else(|| bad_request_error("Vehicle is required"))?;

    request.validate()?;
    customer.validate()?;
    vehicle.validate()?;
    for item in &request.items {
        item.validate()?;
    }

    Ok((customer, vehicle))
}

/// Escrituras del flujo, en orden: cliente, vehículo, orden, items.
/// La respuesta se compone con las filas devueltas, items en el orden de entrada.
async fn apply(
    tx: &mut dyn ServiceOrderTx,
    actor: &AuthenticatedUser,
    request: &ServiceOrderRequest,
    customer: &CustomerInput,
    vehicle: &VehicleInput,
) -> Result<ServiceOrderDetail, AppError> {
    let customer = tx.upsert_customer(actor, customer).await?;
    let vehicle = tx.upsert_vehicle(actor, vehicle).await?;

    let changes = ServiceOrderChanges {
        id: request.id,
        customer_id: customer.id,
        vehicle_id: vehicle.id,
        status: request.status.clone(),
        insurance_company_id: request.insurance_company_id,
        start_at: request.start_at,
        end_at: request.end_at,
        note: request.note.clone(),
    };
    let service_order = tx.upsert_service_order(actor, &changes).await?;

    let mut service_order_items: Vec<ServiceOrderItem> = Vec::with_capacity(request.items.len());
    for input in &request.items {
        let item = tx.upsert_item(actor, service_order.id, input).await?;
        // Un id repetido en el payload sobrescribe su entrada anterior
        match service_order_items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => service_order_items.push(item),
        }
    }

    Ok(ServiceOrderDetail {
        service_order,
        service_order_items,
        customer,
        vehicle,
    })
}
