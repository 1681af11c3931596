//! Tests contra PostgreSQL real.
//!
//! Sólo se ejecutan si `DATABASE_URL` está definido; cada test crea su propio
//! tenant para no interferir con los demás.

use anyhow::Result;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use workshop_api::config::DatabaseConfig;
use workshop_api::controllers::service_order_controller::ServiceOrderController;
use workshop_api::database::DatabaseConnection;
use workshop_api::dto::{CustomerInput, PageRequest, ServiceOrderItemInput, ServiceOrderRequest, VehicleInput};
use workshop_api::middleware::auth::AuthenticatedUser;
use workshop_api::models::{Contact, Customer, ServiceOrderChanges};
use workshop_api::repositories::{Columns, ListFilter, Repositories};
use workshop_api::utils::errors::AppError;

async fn setup() -> Result<Option<(PgPool, AuthenticatedUser)>> {
    if std::env::var("DATABASE_URL").is_err() {
        println!("Skipping PostgreSQL tests (DATABASE_URL is not set)");
        return Ok(None);
    }

    let config = DatabaseConfig::from_env()?;
    let connection = DatabaseConnection::connect(&config).await?;
    connection.run_migrations().await?;
    let pool = connection.pool().clone();

    let tenant_id = Uuid::new_v4();
    sqlx::query("INSERT INTO tenants (id, name) VALUES ($1, $2)")
        .bind(tenant_id)
        .bind(format!("workshop-{}", tenant_id))
        .execute(&pool)
        .await?;

    Ok(Some((
        pool,
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            tenant_id,
        },
    )))
}

fn changes(customer_id: Uuid, vehicle_id: Uuid) -> ServiceOrderChanges {
    ServiceOrderChanges {
        id: None,
        customer_id,
        vehicle_id,
        status: None,
        insurance_company_id: None,
        start_at: None,
        end_at: None,
        note: None,
    }
}

#[tokio::test]
async fn test_upsert_commit_and_update() -> Result<()> {
    let Some((pool, actor)) = setup().await? else {
        return Ok(());
    };
    let repositories = Repositories::postgres(pool);
    let store = &repositories.service_orders;

    let mut tx = store.begin().await?;
    let customer = tx
        .upsert_customer(
            &actor,
            &CustomerInput {
                name: Some("Ana".to_string()),
                ..Default::default()
            },
        )
        .await?;
    let vehicle = tx
        .upsert_vehicle(
            &actor,
            &VehicleInput {
                plate: Some("ABC-1234".to_string()),
                ..Default::default()
            },
        )
        .await?;
    let order = tx
        .upsert_service_order(&actor, &changes(customer.id, vehicle.id))
        .await?;
    let item = tx
        .upsert_item(
            &actor,
            order.id,
            &ServiceOrderItemInput {
                description: Some("Oil change".to_string()),
                value: Some(Decimal::from(50)),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await?;

    assert_eq!(customer.status, "active");
    assert_eq!(order.status, "pending");
    assert_eq!(item.quantity, 1);
    assert_eq!(item.item_type, "parts");
    assert_eq!(item.total, Decimal::from(50));

    let mut tx = store.begin().await?;
    let updated = tx
        .upsert_item(
            &actor,
            order.id,
            &ServiceOrderItemInput {
                id: Some(item.id),
                quantity: Some(3),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await?;

    assert_eq!(updated.id, item.id);
    assert_eq!(updated.description, "Oil change");
    assert_eq!(updated.total, Decimal::from(150));

    let detail = store
        .find_detail(actor.tenant_id, order.id)
        .await?
        .expect("service order should exist");
    assert_eq!(detail.service_order_items.len(), 1);
    assert_eq!(detail.customer.name, "Ana");
    assert_eq!(detail.vehicle.plate, "ABC-1234");

    Ok(())
}

#[tokio::test]
async fn test_rollback_leaves_no_rows() -> Result<()> {
    let Some((pool, actor)) = setup().await? else {
        return Ok(());
    };
    let repositories = Repositories::postgres(pool);

    let mut tx = repositories.service_orders.begin().await?;
    tx.upsert_customer(
        &actor,
        &CustomerInput {
            name: Some("Ghost".to_string()),
            ..Default::default()
        },
    )
    .await?;
    let result = tx
        .upsert_item(
            &actor,
            Uuid::new_v4(),
            &ServiceOrderItemInput {
                description: Some("Unknown".to_string()),
                value: Some(Decimal::ONE),
                catalog_item_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Persistence(_))));
    tx.rollback().await?;

    let page = repositories
        .customers
        .list(actor.tenant_id, ListFilter::default(), PageRequest::new(None, None))
        .await?;
    assert_eq!(page.total, 0);

    Ok(())
}

#[tokio::test]
async fn test_foreign_tenant_row_is_forbidden() -> Result<()> {
    let Some((pool, owner)) = setup().await? else {
        return Ok(());
    };
    let Some((_, intruder)) = setup().await? else {
        return Ok(());
    };
    let repositories = Repositories::postgres(pool);
    let store = &repositories.service_orders;

    let mut tx = store.begin().await?;
    let customer = tx
        .upsert_customer(
            &owner,
            &CustomerInput {
                name: Some("Ana".to_string()),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await?;

    let mut tx = store.begin().await?;
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
    tx.rollback().await?;

    let stored: Option<Customer> = repositories
        .customers
        .find_by_id(owner.tenant_id, customer.id)
        .await?;
    assert_eq!(stored.map(|c| c.name).as_deref(), Some("Ana"));

    let page = repositories
        .customers
        .list(owner.tenant_id, ListFilter::search("an"), PageRequest::new(None, None))
        .await?;
    assert_eq!(page.total, 1);

    Ok(())
}

#[tokio::test]
async fn test_upsert_response_and_detail_keep_item_order() -> Result<()> {
    let Some((pool, actor)) = setup().await? else {
        return Ok(());
    };
    let repositories = Repositories::postgres(pool);
    let controller = ServiceOrderController::new(repositories.clone());

    let names: Vec<String> = (1..=8).map(|n| format!("Item {}", n)).collect();
    let request = ServiceOrderRequest {
        customer: Some(CustomerInput {
            name: Some("Ana".to_string()),
            ..Default::default()
        }),
        vehicle: Some(VehicleInput {
            plate: Some("ABC-1234".to_string()),
            ..Default::default()
        }),
        items: names
            .iter()
            .map(|name| ServiceOrderItemInput {
                description: Some(name.clone()),
                value: Some(Decimal::from(10)),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    let created = controller.upsert(actor, request).await?;
    let returned: Vec<String> = created
        .service_order_items
        .iter()
        .map(|item| item.description.clone())
        .collect();
    assert_eq!(returned, names);

    let detail = controller.get(actor, created.service_order.id).await?;
    let stored: Vec<String> = detail
        .service_order_items
        .into_iter()
        .map(|item| item.description)
        .collect();
    assert_eq!(stored, names);

    Ok(())
}

#[tokio::test]
async fn test_catalog_sku_is_unique_per_tenant() -> Result<()> {
    let Some((pool, first)) = setup().await? else {
        return Ok(());
    };
    let Some((_, second)) = setup().await? else {
        return Ok(());
    };

    let insert = |tenant_id: Uuid| {
        sqlx::query(
            "INSERT INTO catalog (id, tenant_id, description, sku, value, type) VALUES ($1, $2, 'Brake pads', 'BRK-01', 120, 'parts')",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .execute(&pool)
    };

    insert(first.tenant_id).await?;
    insert(second.tenant_id).await?;
    assert!(insert(first.tenant_id).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_contacts_are_searchable_and_cascade() -> Result<()> {
    let Some((pool, actor)) = setup().await? else {
        return Ok(());
    };
    let repositories = Repositories::postgres(pool);

    let customer: Customer = repositories
        .customer_writer
        .create(&actor, None, Columns::new().text("name", &Some("Ana".to_string())))
        .await?;
    assert_eq!(customer.status, "active");

    let contact: Contact = repositories
        .contact_writer
        .create(
            &actor,
            Some(customer.id),
            Columns::new()
                .text("type", &Some("mobile".to_string()))
                .text("number", &Some("81 99999-1234".to_string())),
        )
        .await?;
    assert_eq!(contact.customer_id, customer.id);

    let found = repositories
        .customers
        .list(actor.tenant_id, ListFilter::search("99999-12"), PageRequest::new(None, None))
        .await?;
    assert_eq!(found.total, 1);

    let vehicle = repositories
        .customer_vehicles
        .create_vehicle_for(&actor, customer.id, Columns::new().text("plate", &Some("DEF-5678".to_string())))
        .await?;
    let owners = repositories
        .customer_vehicles
        .customers_of(actor.tenant_id, vehicle.id)
        .await?;
    assert_eq!(owners.len(), 1);

    assert!(repositories.customers.delete(actor.tenant_id, customer.id).await?);
    let contacts: Vec<Contact> = repositories
        .contact_writer
        .list_by_parent(actor.tenant_id, customer.id)
        .await?;
    assert!(contacts.is_empty());

    Ok(())
}
