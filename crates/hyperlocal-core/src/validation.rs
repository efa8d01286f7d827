//! # Validation Module
//!
//! Input validation for requests built on the client.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Form components (UI)                                         │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Service clients (Rust)                                       │
//! │  └── THIS MODULE: reject requests the backend would refuse anyway      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend microservices                                        │
//! │  └── Authoritative checks                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use hyperlocal_core::validation::{validate_coordinates, validate_radius};
//!
//! assert!(validate_coordinates(12.97, 77.59).is_ok());
//! assert!(validate_coordinates(91.0, 0.0).is_err());
//! assert!(validate_radius(5.0).is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::{InventoryForm, RegisterForm, ShopForm};
use crate::MAX_PAGE_SIZE;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Largest search radius the customer service accepts (km).
pub const MAX_SEARCH_RADIUS_KM: f64 = 100.0;

// =============================================================================
// Location Validators
// =============================================================================

/// Validates a latitude/longitude pair.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> ValidationResult<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::OutOfRange {
            field: "latitude".to_string(),
            min: -90.0,
            max: 90.0,
        });
    }

    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::OutOfRange {
            field: "longitude".to_string(),
            min: -180.0,
            max: 180.0,
        });
    }

    Ok(())
}

/// Validates a discovery search radius.
///
/// ## Rules
/// - Must be greater than zero
/// - At most [`MAX_SEARCH_RADIUS_KM`]
pub fn validate_radius(radius_km: f64) -> ValidationResult<()> {
    if radius_km.is_nan() || radius_km <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "radius".to_string(),
        });
    }

    if radius_km > MAX_SEARCH_RADIUS_KM {
        return Err(ValidationError::OutOfRange {
            field: "radius".to_string(),
            min: 0.0,
            max: MAX_SEARCH_RADIUS_KM,
        });
    }

    Ok(())
}

/// Validates pagination parameters. Pages are 1-based.
pub fn validate_pagination(page: u32, page_size: u32) -> ValidationResult<()> {
    if page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "page_size".to_string(),
            min: 1.0,
            max: f64::from(MAX_PAGE_SIZE),
        });
    }

    Ok(())
}

/// Validates a search query and returns it trimmed.
///
/// Empty queries are rejected; the search endpoint needs something to match.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.is_empty() {
        return Err(ValidationError::Required {
            field: "query".to_string(),
        });
    }

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Identity Validators
// =============================================================================

/// Validates a user's display name.
///
/// ## Rules
/// - Must not be empty
/// - At most 100 characters
pub fn validate_display_name(name: &str) -> ValidationResult<()> {
    validate_required_text("name", name, 100)
}

fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Loose email shape check: one `@` with text on both sides and a dot in
/// the domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(())
}

/// Phone numbers may carry a leading `+`, spaces and dashes; 7 to 15 digits.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();
    let body = phone.strip_prefix('+').unwrap_or(phone);

    let allowed = body
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-');
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();

    if !allowed || !(7..=15).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain 7 to 15 digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a registration form.
///
/// ## Rules
/// - Name follows [`validate_display_name`]
/// - At least one of email or phone, each well-formed when present
/// - Identity-provider token must be present
pub fn validate_register_form(form: &RegisterForm) -> ValidationResult<()> {
    validate_display_name(&form.name)?;

    let email = form.email.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let phone = form.phone.as_deref().map(str::trim).filter(|s| !s.is_empty());

    if email.is_none() && phone.is_none() {
        return Err(ValidationError::Required {
            field: "email or phone".to_string(),
        });
    }
    if let Some(email) = email {
        validate_email(email)?;
    }
    if let Some(phone) = phone {
        validate_phone(phone)?;
    }

    if form.firebase_token.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "firebase_token".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Seller Validators
// =============================================================================

/// Validates a new shop.
pub fn validate_shop_form(form: &ShopForm) -> ValidationResult<()> {
    validate_required_text("name", &form.name, 200)?;
    validate_coordinates(form.latitude, form.longitude)?;

    if let Some(number) = form.whatsapp_number.as_deref().filter(|s| !s.trim().is_empty()) {
        validate_phone(number)?;
    }

    Ok(())
}

/// Validates a product listing: price must be positive, stock non-negative.
pub fn validate_inventory(form: &InventoryForm) -> ValidationResult<()> {
    validate_price(form.price)?;
    validate_stock(form.stock)
}

pub fn validate_price(price: f64) -> ValidationResult<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }
    Ok(())
}

pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::InvalidFormat {
            field: "stock".to_string(),
            reason: "must not be negative".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserRole;

    fn register_form() -> RegisterForm {
        RegisterForm {
            name: "Meera".to_string(),
            email: Some("meera@example.com".to_string()),
            phone: None,
            role: UserRole::Customer,
            firebase_token: "token".to_string(),
        }
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(0.0, 0.0).is_ok());
        assert!(validate_coordinates(-90.0, 180.0).is_ok());
        assert!(validate_coordinates(90.1, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_validate_radius() {
        assert!(validate_radius(10.0).is_ok());
        assert!(validate_radius(0.0).is_err());
        assert!(validate_radius(-1.0).is_err());
        assert!(validate_radius(100.5).is_err());
        assert!(validate_radius(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_pagination() {
        assert!(validate_pagination(1, 20).is_ok());
        assert!(validate_pagination(0, 20).is_err());
        assert!(validate_pagination(1, 0).is_err());
        assert!(validate_pagination(1, 101).is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  chai  ").unwrap(), "chai");
        assert!(validate_search_query("   ").is_err());
        assert!(validate_search_query(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_email_and_phone() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("@b.co").is_err());

        assert!(validate_phone("+91 98765-43210").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("call me").is_err());
    }

    #[test]
    fn test_register_form_needs_a_contact() {
        assert!(validate_register_form(&register_form()).is_ok());

        let form = RegisterForm {
            email: None,
            phone: Some("   ".to_string()),
            ..register_form()
        };
        let err = validate_register_form(&form).unwrap_err();
        assert_eq!(err.to_string(), "email or phone is required");
    }

    #[test]
    fn test_register_form_needs_token() {
        let form = RegisterForm {
            firebase_token: String::new(),
            ..register_form()
        };
        assert!(validate_register_form(&form).is_err());
    }

    #[test]
    fn test_validate_shop_form() {
        let form = ShopForm {
            name: "Corner Store".to_string(),
            description: None,
            whatsapp_number: Some("+91 9876543210".to_string()),
            address: None,
            latitude: 12.9,
            longitude: 77.6,
        };
        assert!(validate_shop_form(&form).is_ok());

        let bad = ShopForm {
            latitude: 120.0,
            ..form
        };
        assert!(validate_shop_form(&bad).is_err());
    }

    #[test]
    fn test_validate_inventory() {
        let ok = InventoryForm {
            catalog_item_id: 1,
            price: 49.5,
            stock: 0,
        };
        assert!(validate_inventory(&ok).is_ok());

        assert!(validate_inventory(&InventoryForm { price: 0.0, ..ok.clone() }).is_err());
        assert!(validate_inventory(&InventoryForm { stock: -1, ..ok }).is_err());
    }
}
