use serde::Deserialize;
use validator::Validate;

use crate::utils::validation::validate_not_blank;

// Body de POST /customers/:id/contacts y PATCH /contacts/:id
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactInput {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 30))]
    pub contact_type: Option<String>,
    #[validate(length(max = 32), custom = "validate_not_blank")]
    pub number: Option<String>,
}

// Body de POST /customers/:id/documents y PATCH /documents/:id
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 30))]
    pub document_type: Option<String>,
    #[validate(length(min = 2, max = 2))]
    pub country: Option<String>,
    #[validate(length(max = 64), custom = "validate_not_blank")]
    pub value: Option<String>,
}

// Body de POST /customers/:id/addresses y PATCH /addresses/:id
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[validate(length(max = 255), custom = "validate_not_blank")]
    pub street: Option<String>,
    #[validate(length(max = 20))]
    pub number: Option<String>,
    #[validate(length(max = 255))]
    pub complement: Option<String>,
    #[validate(length(max = 100))]
    pub neighborhood: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 50))]
    pub state: Option<String>,
    #[validate(length(max = 16))]
    pub zip: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contact_type_uses_json_key_type() {
        let input: ContactInput = serde_json::from_value(json!({"type": "mobile", "number": "11 99999-0000"})).unwrap();
        assert_eq!(input.contact_type.as_deref(), Some("mobile"));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_blank_values_are_rejected() {
        let contact = ContactInput {
            number: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(contact.validate().is_err());

        let document = DocumentInput {
            country: Some("BRA".to_string()),
            ..Default::default()
        };
        assert!(document.validate().is_err());
    }
}
