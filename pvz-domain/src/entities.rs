//! Domain Entities for PVZ
//!
//! Pickup points, receptions, products and users.
//! Receptions carry the only lifecycle (`in_progress -> closed`).

use crate::value_objects::{City, DomainError, Email, ProductType, ReceptionStatus, UserRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a PickupPoint
pub type PickupPointId = Uuid;

/// Unique identifier for a Reception
pub type ReceptionId = Uuid;

/// Unique identifier for a Product
pub type ProductId = Uuid;

/// Unique identifier for a User
pub type UserId = Uuid;

// =============================================================================
// PickupPoint
// =============================================================================

/// Physical location where goods are received and handed out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupPoint {
    /// Unique identifier
    pub id: PickupPointId,
    /// When the pickup point was registered
    pub registration_date: DateTime<Utc>,
    /// City of the pickup point
    pub city: City,
}

impl PickupPoint {
    /// Create a pickup point.
    ///
    /// Caller-supplied id and registration date are honored; missing values
    /// are generated.
    pub fn new(
        id: Option<PickupPointId>,
        registration_date: Option<DateTime<Utc>>,
        city: City,
    ) -> Self {
        Self {
            id: id.unwrap_or_else(Uuid::now_v7),
            registration_date: registration_date.unwrap_or_else(Utc::now),
            city,
        }
    }
}

// =============================================================================
// Reception
// =============================================================================

/// Batch intake session at a pickup point
///
/// # Invariants
/// - At most one reception per pickup point is `InProgress` (enforced by the store)
/// - `Closed` is terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reception {
    /// Unique identifier
    pub id: ReceptionId,
    /// When the reception was opened
    pub started_at: DateTime<Utc>,
    /// Owning pickup point
    pub pickup_point_id: PickupPointId,
    /// Lifecycle status
    pub status: ReceptionStatus,
}

impl Reception {
    /// Start a new in-progress reception for a pickup point
    pub fn open(pickup_point_id: PickupPointId) -> Self {
        Self {
            id: Uuid::now_v7(),
            started_at: Utc::now(),
            pickup_point_id,
            status: ReceptionStatus::InProgress,
        }
    }

    /// Check if the reception still accepts products
    pub fn is_open(&self) -> bool {
        self.status == ReceptionStatus::InProgress
    }

    /// Transition to `Closed`
    ///
    /// # Errors
    /// Returns `DomainError::InvalidStateTransition` if already closed
    pub fn close(&mut self) -> Result<(), DomainError> {
        if !self.is_open() {
            return Err(DomainError::InvalidStateTransition(format!(
                "reception {} is already closed",
                self.id
            )));
        }
        self.status = ReceptionStatus::Closed;
        Ok(())
    }
}

// =============================================================================
// Product
// =============================================================================

/// Item scanned into a reception
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier
    pub id: ProductId,
    /// When the product was scanned
    pub added_at: DateTime<Utc>,
    /// Product category
    pub product_type: ProductType,
    /// Reception the product was scanned into
    pub reception_id: ReceptionId,
}

/// A product before it is bound to a reception.
///
/// The store resolves the open reception inside its transaction and
/// finalizes the draft there, stamping `added_at` at that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductDraft {
    /// Unique identifier
    pub id: ProductId,
    /// Product category
    pub product_type: ProductType,
}

impl ProductDraft {
    /// New draft with a fresh id
    pub fn new(product_type: ProductType) -> Self {
        Self {
            id: Uuid::now_v7(),
            product_type,
        }
    }

    /// Bind the draft to a reception, stamped now
    pub fn into_product(self, reception_id: ReceptionId) -> Product {
        Product {
            id: self.id,
            added_at: Utc::now(),
            product_type: self.product_type,
            reception_id,
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// Registered account
///
/// `password_hash` is a PHC string; it is empty for accounts that can only
/// be obtained through dummy login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique identifier
    pub id: UserId,
    /// Login email, unique
    pub email: Email,
    /// Argon2 PHC string; empty for dummy accounts
    pub password_hash: String,
    /// Role used for authorization
    pub role: UserRole,
}

impl User {
    /// Create a user with a fresh id
    pub fn new(email: Email, password_hash: String, role: UserRole) -> Self {
        Self {
            id: Uuid::now_v7(),
            email,
            password_hash,
            role,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pickup_point_honors_supplied_values() {
        let id = Uuid::now_v7();
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let point = PickupPoint::new(Some(id), Some(date), City::Kazan);

        assert_eq!(point.id, id);
        assert_eq!(point.registration_date, date);
        assert_eq!(point.city, City::Kazan);
    }

    #[test]
    fn test_pickup_point_generates_missing_values() {
        let before = Utc::now();
        let point = PickupPoint::new(None, None, City::Moscow);

        assert!(!point.id.is_nil());
        assert!(point.registration_date >= before);
    }

    #[test]
    fn test_reception_lifecycle() {
        let mut reception = Reception::open(Uuid::now_v7());
        assert!(reception.is_open());
        assert_eq!(reception.status, ReceptionStatus::InProgress);

        reception.close().unwrap();
        assert!(!reception.is_open());
        assert_eq!(reception.status, ReceptionStatus::Closed);
    }

    #[test]
    fn test_reception_close_twice_fails() {
        let mut reception = Reception::open(Uuid::now_v7());
        reception.close().unwrap();

        let result = reception.close();
        assert!(matches!(result, Err(DomainError::InvalidStateTransition(_))));
        assert_eq!(reception.status, ReceptionStatus::Closed);
    }

    #[test]
    fn test_product_draft_binds_to_reception() {
        let draft = ProductDraft::new(ProductType::Electronics);
        let reception_id = Uuid::now_v7();
        let before = Utc::now();
        let product = draft.into_product(reception_id);

        assert_eq!(product.id, draft.id);
        assert!(product.added_at >= before);
        assert_eq!(product.product_type, ProductType::Electronics);
        assert_eq!(product.reception_id, reception_id);
    }

    #[test]
    fn test_reception_serializes_wire_status() -> anyhow::Result<()> {
        let reception = Reception::open(Uuid::now_v7());
        let json = serde_json::to_value(&reception)?;
        assert_eq!(json["status"], "in_progress");
        Ok(())
    }
}
