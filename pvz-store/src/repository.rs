//! Repository trait definitions (Ports)
//!
//! These traits define the storage interface for the domain.
//! Implementations can be PostgreSQL, in-memory, or mock for testing.
//!
//! Every mutating reception/product operation is atomic with respect to
//! other mutations on the same pickup point: the implementation takes the
//! pickup point lock, then resolves the open reception, then writes.

use crate::error::StoreError;
use async_trait::async_trait;
use pvz_domain::{
    PickupPoint, PickupPointId, PickupPointQuery, PickupPointView, Product, ProductDraft,
    Reception, ReceptionStatus, User, UserId,
};

/// Repository for PickupPoint entities
#[async_trait]
pub trait PickupPointRepository: Send + Sync {
    /// Insert a pickup point.
    ///
    /// Fails with `StoreError::Duplicate` if the id is taken.
    async fn create(&self, point: &PickupPoint) -> Result<(), StoreError>;

    /// Find a pickup point by ID
    async fn find_by_id(&self, id: PickupPointId) -> Result<Option<PickupPoint>, StoreError>;

    /// Composite listing: pickup points (paginated, ordered by id) with their
    /// receptions and products, optionally filtered by reception start time.
    async fn list_views(&self, query: &PickupPointQuery)
        -> Result<Vec<PickupPointView>, StoreError>;

    /// All pickup points ordered by id
    async fn list_all(&self) -> Result<Vec<PickupPoint>, StoreError>;
}

/// Repository for Reception entities
#[async_trait]
pub trait ReceptionRepository: Send + Sync {
    /// Insert an in-progress reception.
    ///
    /// Fails with `StoreError::ReceptionAlreadyOpen` if the pickup point
    /// already has one, `StoreError::NotFound` if the pickup point is missing.
    /// A reception in any other status is rejected with `StoreError::Domain`.
    async fn open(&self, reception: &Reception) -> Result<(), StoreError>;

    /// Close the in-progress reception of a pickup point and return it.
    ///
    /// Fails with `StoreError::NoOpenReception` if there is none.
    async fn close(&self, pickup_point_id: PickupPointId) -> Result<Reception, StoreError>;

    /// Status of the most recently started reception, if any
    async fn last_status(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<ReceptionStatus>, StoreError>;
}

/// Repository for Product entities
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Add a product to the open reception of a pickup point.
    ///
    /// `added_at` is stamped by the store after the lock is taken, so it
    /// follows commit order.
    /// Fails with `StoreError::NoOpenReception` if there is none.
    async fn append(
        &self,
        pickup_point_id: PickupPointId,
        draft: &ProductDraft,
    ) -> Result<Product, StoreError>;

    /// Delete the most recently added product of the open reception.
    ///
    /// Returns `None` when the open reception is empty. Fails with
    /// `StoreError::NoOpenReception` if there is no open reception.
    async fn remove_last(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Product>, StoreError>;
}

/// Repository for User entities
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user.
    ///
    /// Fails with `StoreError::Duplicate` if the email is taken.
    async fn create(&self, user: &User) -> Result<(), StoreError>;

    /// Find a user by email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Find a user by ID
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;
}

/// Combined store interface
pub trait Store: Send + Sync {
    /// Get pickup point repository
    fn pickup_points(&self) -> &dyn PickupPointRepository;

    /// Get reception repository
    fn receptions(&self) -> &dyn ReceptionRepository;

    /// Get product repository
    fn products(&self) -> &dyn ProductRepository;

    /// Get user repository
    fn users(&self) -> &dyn UserRepository;
}
