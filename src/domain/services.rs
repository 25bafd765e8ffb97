//! Service catalogue domain types
//!
//! Bookable services and the per-professional offering overrides.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response DTO for a catalogue service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub duration_minutes: i32,
    pub price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for creating or replacing a service.
///
/// Every field is optional at the wire level so a missing field is reported
/// as a validation error instead of a body rejection.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// A service request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidService {
    pub name: String,
    pub description: String,
    pub duration_minutes: i32,
    pub price: Decimal,
    pub is_active: bool,
}

impl ServiceRequest {
    pub fn validate(self) -> Result<ValidService, String> {
        let name = self.name.map(|s| s.trim().to_string()).unwrap_or_default();
        let description = self
            .description
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let (Some(duration_minutes), Some(price)) = (self.duration_minutes, self.price) else {
            return Err("Missing required fields".to_string());
        };
        if name.is_empty() || description.is_empty() {
            return Err("Missing required fields".to_string());
        }
        if duration_minutes <= 0 {
            return Err("duration_minutes must be greater than zero".to_string());
        }
        if duration_minutes > 24 * 60 {
            return Err("duration_minutes cannot exceed one day".to_string());
        }
        if price.is_sign_negative() {
            return Err("price cannot be negative".to_string());
        }

        Ok(ValidService {
            name,
            description,
            duration_minutes,
            price: price.round_dp(2),
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

/// Query parameters for the catalogue listing
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// A catalogue service as seen by one professional
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferingResponse {
    pub id: Option<Uuid>,
    pub service: ServiceResponse,
    pub custom_price: Option<Decimal>,
    pub is_offered: bool,
    pub effective_price: Decimal,
}

/// Request DTO for replacing an offering; an absent `custom_price` clears the override
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOfferingRequest {
    #[serde(default = "default_offered")]
    pub is_offered: bool,
    #[serde(default)]
    pub custom_price: Option<Decimal>,
}

fn default_offered() -> bool {
    true
}

/// Price charged for a service by a professional.
///
/// A zero custom price is treated as "no override", matching how the booking
/// UI has always displayed offerings.
pub fn effective_price(custom_price: Option<Decimal>, base_price: Decimal) -> Decimal {
    match custom_price {
        Some(price) if !price.is_zero() => price,
        _ => base_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn request() -> ServiceRequest {
        ServiceRequest {
            name: Some("Deep Tissue".to_string()),
            description: Some("Firm pressure massage".to_string()),
            duration_minutes: Some(60),
            price: Some(Decimal::new(9500, 2)),
            is_active: None,
        }
    }

    #[test]
    fn complete_request_validates() {
        let valid = request().validate().unwrap();
        assert_eq!(valid.name, "Deep Tissue");
        assert_eq!(valid.duration_minutes, 60);
        assert_eq!(valid.price, Decimal::new(9500, 2));
        assert!(valid.is_active);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut req = request();
        req.description = Some("   ".to_string());
        assert_eq!(req.validate().unwrap_err(), "Missing required fields");

        let mut req = request();
        req.price = None;
        assert_eq!(req.validate().unwrap_err(), "Missing required fields");

        assert!(ServiceRequest::default().validate().is_err());
    }

    #[test]
    fn non_positive_duration_and_negative_price_are_rejected() {
        let mut req = request();
        req.duration_minutes = Some(0);
        assert!(req.validate().is_err());

        let mut req = request();
        req.price = Some(Decimal::new(-1, 0));
        assert!(req.validate().is_err());
    }

    #[test]
    fn free_services_are_allowed() {
        let mut req = request();
        req.price = Some(Decimal::ZERO);
        assert_eq!(req.validate().unwrap().price, Decimal::ZERO);
    }

    #[test]
    fn effective_price_prefers_override() {
        let base = Decimal::new(8000, 2);
        assert_eq!(effective_price(None, base), base);
        assert_eq!(effective_price(Some(Decimal::ZERO), base), base);
        assert_eq!(
            effective_price(Some(Decimal::new(7000, 2)), base),
            Decimal::new(7000, 2)
        );
    }
}
