//! PVZ Storage Layer
//!
//! Provides persistence for pickup points, receptions, products and users.
//!
//! # Architecture
//!
//! - **Repository traits**: Define the storage interface (ports)
//! - **In-memory store**: Fast implementation for testing
//! - **PostgreSQL store**: Production implementation (feature `postgres`)
//!
//! # Usage
//!
//! ```rust
//! use pvz_store::{MemoryStore, Store};
//! use pvz_domain::{City, PickupPoint, ProductDraft, ProductType, Reception};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!
//!     let point = PickupPoint::new(None, None, City::Moscow);
//!     store.pickup_points().create(&point).await.unwrap();
//!
//!     // Products can only be added while a reception is open
//!     store.receptions().open(&Reception::open(point.id)).await.unwrap();
//!     let product = store
//!         .products()
//!         .append(point.id, &ProductDraft::new(ProductType::Shoes))
//!         .await
//!         .unwrap();
//!     println!("Added product {}", product.id);
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod repository;

// Re-exports
pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;
pub use repository::{
    PickupPointRepository, ProductRepository, ReceptionRepository, Store, UserRepository,
};
