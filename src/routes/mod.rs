pub mod customer_routes;
pub mod resource_routes;
pub mod service_order_routes;
