//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos que mapean las tablas de
//! PostgreSQL. Todas las filas de negocio están aisladas por `tenant_id`.

pub mod catalog;
pub mod contact;
pub mod customer;
pub mod employee;
pub mod service_order;
pub mod supplier;
pub mod vehicle;

pub use catalog::CatalogItem;
pub use contact::{Address, Contact, Document};
pub use customer::Customer;
pub use employee::Employee;
pub use service_order::{ServiceOrder, ServiceOrderChanges, ServiceOrderDetail, ServiceOrderItem};
pub use supplier::Supplier;
pub use vehicle::Vehicle;
