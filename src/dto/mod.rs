pub mod customer_dto;
pub mod pagination_dto;
pub mod service_order_dto;

pub use customer_dto::{AddressInput, ContactInput, DocumentInput};
pub use pagination_dto::{ListQuery, Page, PageRequest, PageResponse};
pub use service_order_dto::{CustomerInput, ServiceOrderItemInput, ServiceOrderRequest, VehicleInput};
