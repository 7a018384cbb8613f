//! Operation permission table
//!
//! Every API operation maps to the set of roles allowed to perform it.

use crate::value_objects::UserRole;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operations exposed by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Token for a shared per-role account
    DummyLogin,
    /// Create an account
    Register,
    /// Password login
    Login,
    /// Register a pickup point
    CreatePickupPoint,
    /// Paginated composite listing
    ListPickupPoints,
    /// Every pickup point
    ListAllPickupPoints,
    /// Status of the latest reception
    GetLastReceptionStatus,
    /// Start a reception
    OpenReception,
    /// Finish the open reception
    CloseReception,
    /// Scan a product into the open reception
    AppendProduct,
    /// Undo the last scan
    RemoveLastProduct,
}

const EMPLOYEE: &[UserRole] = &[UserRole::Employee];
const MODERATOR: &[UserRole] = &[UserRole::Moderator];
const ANY: &[UserRole] = &[UserRole::Employee, UserRole::Moderator];

impl Operation {
    /// Roles allowed to perform the operation. Empty for public operations.
    pub fn allowed_roles(&self) -> &'static [UserRole] {
        match self {
            Operation::DummyLogin | Operation::Register | Operation::Login => &[],
            Operation::CreatePickupPoint => MODERATOR,
            Operation::OpenReception
            | Operation::CloseReception
            | Operation::AppendProduct
            | Operation::RemoveLastProduct => EMPLOYEE,
            Operation::ListPickupPoints
            | Operation::ListAllPickupPoints
            | Operation::GetLastReceptionStatus => ANY,
        }
    }

    /// Public operations need no token
    pub fn is_public(&self) -> bool {
        self.allowed_roles().is_empty()
    }

    /// Check whether `role` may perform the operation
    pub fn permits(&self, role: UserRole) -> bool {
        self.is_public() || self.allowed_roles().contains(&role)
    }

    /// Stable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Operation::DummyLogin => "dummy_login",
            Operation::Register => "register",
            Operation::Login => "login",
            Operation::CreatePickupPoint => "create_pickup_point",
            Operation::ListPickupPoints => "list_pickup_points",
            Operation::ListAllPickupPoints => "list_all_pickup_points",
            Operation::GetLastReceptionStatus => "get_last_reception_status",
            Operation::OpenReception => "open_reception",
            Operation::CloseReception => "close_reception",
            Operation::AppendProduct => "append_product",
            Operation::RemoveLastProduct => "remove_last_product",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moderator_only_creates_pickup_points() {
        assert!(Operation::CreatePickupPoint.permits(UserRole::Moderator));
        assert!(!Operation::CreatePickupPoint.permits(UserRole::Employee));
    }

    #[test]
    fn test_employee_only_mutates_receptions() {
        for op in [
            Operation::OpenReception,
            Operation::CloseReception,
            Operation::AppendProduct,
            Operation::RemoveLastProduct,
        ] {
            assert!(op.permits(UserRole::Employee), "{op}");
            assert!(!op.permits(UserRole::Moderator), "{op}");
        }
    }

    #[test]
    fn test_reads_open_to_both_roles() {
        for op in [
            Operation::ListPickupPoints,
            Operation::ListAllPickupPoints,
            Operation::GetLastReceptionStatus,
        ] {
            assert!(op.permits(UserRole::Employee));
            assert!(op.permits(UserRole::Moderator));
            assert!(!op.is_public());
        }
    }

    #[test]
    fn test_auth_operations_are_public() {
        assert!(Operation::DummyLogin.is_public());
        assert!(Operation::Register.is_public());
        assert!(Operation::Login.is_public());
    }
}
