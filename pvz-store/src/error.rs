//! Storage layer errors

use pvz_domain::PickupPointId;
use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity (pickup_point, reception, product, user)
        entity_type: String,
        /// Entity ID
        id: String,
    },

    /// Duplicate entity (unique key collision)
    #[error("Duplicate entity: {entity_type} with id {id}")]
    Duplicate {
        /// Type of entity
        entity_type: String,
        /// Entity ID or unique key
        id: String,
    },

    /// Pickup point already has an in-progress reception
    #[error("Reception already in progress for pickup point {pickup_point_id}")]
    ReceptionAlreadyOpen {
        /// Pickup point ID
        pickup_point_id: PickupPointId,
    },

    /// Pickup point has no in-progress reception
    #[error("No open reception for pickup point {pickup_point_id}")]
    NoOpenReception {
        /// Pickup point ID
        pickup_point_id: PickupPointId,
    },

    /// Failed to begin, commit or roll back a transaction
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Stored value could not be decoded into a domain type
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Domain error passthrough
    #[error("Domain error: {0}")]
    Domain(#[from] pvz_domain::DomainError),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a duplicate error
    pub fn duplicate(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a reception-already-open error
    pub fn reception_already_open(pickup_point_id: PickupPointId) -> Self {
        Self::ReceptionAlreadyOpen { pickup_point_id }
    }

    /// Create a no-open-reception error
    pub fn no_open_reception(pickup_point_id: PickupPointId) -> Self {
        Self::NoOpenReception { pickup_point_id }
    }
}

/// Only in-progress receptions may be inserted; closing goes through `close`.
pub(crate) fn ensure_in_progress(reception: &pvz_domain::Reception) -> Result<(), StoreError> {
    if reception.is_open() {
        return Ok(());
    }
    Err(StoreError::Domain(pvz_domain::DomainError::InvalidStateTransition(format!(
        "reception {} must be in_progress to open",
        reception.id
    ))))
}

/// Check if a sqlx error is a unique constraint violation
#[cfg(feature = "postgres")]
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c == "23505").unwrap_or(false),
        _ => false,
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                entity_type: "unknown".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            },
            sqlx::Error::Database(db_err) => {
                // Check for unique constraint violation
                if db_err.code().map(|c| c == "23505").unwrap_or(false) {
                    StoreError::Duplicate {
                        entity_type: "unknown".to_string(),
                        id: "unknown".to_string(),
                    }
                } else {
                    StoreError::Database(db_err.to_string())
                }
            },
            _ => StoreError::Database(err.to_string()),
        }
    }
}
