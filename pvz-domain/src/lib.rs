//! PVZ Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains entities, value objects, composite views and the permission table.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod permissions;
pub mod value_objects;
pub mod views;

// Re-export commonly used types
pub use entities::{
    PickupPoint, PickupPointId, Product, ProductDraft, ProductId, Reception, ReceptionId, User,
    UserId,
};
pub use permissions::Operation;
pub use value_objects::{
    City, DateRange, DomainError, Email, PageRequest, PickupPointQuery, ProductType,
    ReceptionStatus, UserRole, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
pub use views::{group_join_rows, JoinRow, PickupPointView, ReceptionView};
