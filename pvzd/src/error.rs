//! Daemon error types.
//!
//! `PvzError` is the taxonomy exposed to callers. User errors carry a
//! message safe to return to the client; internal errors are logged and
//! surfaced generically.

use pvz_domain::{DomainError, Operation, PickupPointId, UserRole};
use pvz_store::StoreError;
use thiserror::Error;

/// Broad error class, drives the response status and logging level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caused by the request; reported back verbatim
    User,
    /// Caused by the service or its dependencies
    Internal,
}

/// Service-level errors.
#[derive(Debug, Error)]
pub enum PvzError {
    // -------------------------------------------------------------------------
    // Request / validation
    // -------------------------------------------------------------------------
    /// Malformed request (body, query or path)
    #[error("{0}")]
    InvalidRequest(String),

    /// Unknown city
    #[error("unknown city: {0}")]
    InvalidCity(String),

    /// Unknown product type
    #[error("unknown product type: {0}")]
    InvalidProductType(String),

    /// Date interval end before start
    #[error("end date cannot be before start date")]
    InvalidDateRange,

    /// Page size outside the accepted range
    #[error("limit must be between 1 and {}", pvz_domain::MAX_PAGE_LIMIT)]
    InvalidLimit,

    /// Page number below one
    #[error("page must be greater than zero")]
    InvalidPage,

    // -------------------------------------------------------------------------
    // Reception / product state
    // -------------------------------------------------------------------------
    /// Pickup point already has an in-progress reception
    #[error("reception already in progress for pickup point {0}")]
    ReceptionAlreadyOpen(PickupPointId),

    /// Pickup point has no in-progress reception
    #[error("no open reception")]
    NoOpenReception(PickupPointId),

    /// Pickup point never had a reception
    #[error("no reception")]
    NoReceptionFound(PickupPointId),

    /// Pickup point id already taken
    #[error("pickup point already exists: {0}")]
    PickupPointExists(PickupPointId),

    /// Pickup point does not exist
    #[error("pickup point not found: {0}")]
    PickupPointNotFound(PickupPointId),

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------
    /// Unknown role
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// Malformed email address
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    /// Email already registered
    #[error("user already exists: {0}")]
    UserExists(String),

    /// Unknown email or wrong password
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed or expired token
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but role not allowed for the operation
    #[error("forbidden: {role} cannot perform {operation}")]
    Forbidden {
        /// Requested operation
        operation: Operation,
        /// Caller's role
        role: UserRole,
    },

    // -------------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------------
    /// Store error
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Token signing or password hashing failure
    #[error("Auth error: {0}")]
    Auth(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PvzError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PvzError::Store(_) | PvzError::Auth(_) | PvzError::Config(_) | PvzError::Internal(_) => {
                ErrorKind::Internal
            },
            _ => ErrorKind::User,
        }
    }

    /// True for errors caused by a missing open reception
    pub fn is_gate_closed(&self) -> bool {
        matches!(self, PvzError::NoOpenReception(_) | PvzError::NoReceptionFound(_))
    }
}

impl From<DomainError> for PvzError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidCity(c) => PvzError::InvalidCity(c),
            DomainError::InvalidProductType(t) => PvzError::InvalidProductType(t),
            DomainError::InvalidRole(r) => PvzError::InvalidRole(r),
            DomainError::InvalidEmail(e) => PvzError::InvalidEmail(e),
            DomainError::InvalidLimit { .. } => PvzError::InvalidLimit,
            DomainError::InvalidPage(_) => PvzError::InvalidPage,
            DomainError::InvalidDateRange => PvzError::InvalidDateRange,
            DomainError::InvalidStatus(_) | DomainError::InvalidStateTransition(_) => {
                PvzError::Internal(err.to_string())
            },
        }
    }
}

impl From<StoreError> for PvzError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ReceptionAlreadyOpen { pickup_point_id } => {
                PvzError::ReceptionAlreadyOpen(pickup_point_id)
            },
            StoreError::NoOpenReception { pickup_point_id } => {
                PvzError::NoOpenReception(pickup_point_id)
            },
            StoreError::Domain(e) => e.into(),
            other => PvzError::Store(other),
        }
    }
}

/// Result type for service operations.
pub type PvzResult<T> = Result<T, PvzError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_user_messages_match_contract() {
        let id = Uuid::now_v7();
        assert_eq!(PvzError::NoOpenReception(id).to_string(), "no open reception");
        assert_eq!(PvzError::NoReceptionFound(id).to_string(), "no reception");
        assert_eq!(PvzError::InvalidLimit.to_string(), "limit must be between 1 and 30");
        assert_eq!(PvzError::InvalidPage.to_string(), "page must be greater than zero");
        assert_eq!(
            PvzError::InvalidDateRange.to_string(),
            "end date cannot be before start date"
        );
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(PvzError::InvalidLimit.kind(), ErrorKind::User);
        assert_eq!(PvzError::InvalidCredentials.kind(), ErrorKind::User);
        assert_eq!(
            PvzError::Store(StoreError::Database("down".into())).kind(),
            ErrorKind::Internal
        );
        assert_eq!(PvzError::Config("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_gate_closed() {
        let id = Uuid::now_v7();
        assert!(PvzError::NoOpenReception(id).is_gate_closed());
        assert!(PvzError::NoReceptionFound(id).is_gate_closed());
        assert!(!PvzError::ReceptionAlreadyOpen(id).is_gate_closed());
    }

    #[test]
    fn test_store_error_mapping() {
        let id = Uuid::now_v7();
        let err: PvzError = StoreError::reception_already_open(id).into();
        assert!(matches!(err, PvzError::ReceptionAlreadyOpen(got) if got == id));

        let err: PvzError = StoreError::no_open_reception(id).into();
        assert!(matches!(err, PvzError::NoOpenReception(got) if got == id));

        let err: PvzError = StoreError::Database("boom".into()).into();
        assert!(matches!(err, PvzError::Store(_)));
    }

    #[test]
    fn test_domain_error_mapping() {
        let err: PvzError = DomainError::InvalidCity("Paris".into()).into();
        assert!(matches!(err, PvzError::InvalidCity(c) if c == "Paris"));

        let err: PvzError = DomainError::InvalidLimit { value: 0, max: 30 }.into();
        assert!(matches!(err, PvzError::InvalidLimit));
    }
}
