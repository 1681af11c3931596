//! Utilidades de validación
//!
//! Validadores personalizados usados por los DTOs con `#[validate(custom = ...)]`.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use validator::ValidationError;

lazy_static! {
    /// Matrícula brasileña: formato antiguo (ABC-1234) o Mercosur (ABC1D23)
    pub static ref PLATE_REGEX: Regex =
        Regex::new(r"^(?i)[A-Z]{3}-?[0-9][A-Z0-9][0-9]{2}$").expect("plate regex is valid");
}

/// Estados permitidos para un cliente
pub const CUSTOMER_STATUSES: [&str; 2] = ["active", "inactive"];

/// Validar que un string no esté vacío
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_blank");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar formato de matrícula
pub fn validate_plate(value: &str) -> Result<(), ValidationError> {
    if !PLATE_REGEX.is_match(value.trim()) {
        let mut error = ValidationError::new("plate");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar el estado de un cliente
pub fn validate_customer_status(value: &str) -> Result<(), ValidationError> {
    if !CUSTOMER_STATUSES.contains(&value) {
        let mut error = ValidationError::new("enum");
        error.add_param("value".into(), &value.to_string());
        error.add_param("allowed_values".into(), &CUSTOMER_STATUSES.join(","));
        return Err(error);
    }
    Ok(())
}

/// Validar importes monetarios (no negativos)
pub fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut error = ValidationError::new("non_negative");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}
