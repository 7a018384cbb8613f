//! Test helpers for PVZ store- and service-level tests.
//!
//! Seeding helpers that work against any [`pvz_store::Store`]. Database-backed
//! tests get their schema from `#[sqlx::test(migrations = "../migrations")]`.

mod helpers;

pub use helpers::{
    seed_closed_reception, seed_open_reception, seed_pickup_point, seed_products,
    seed_reception_at,
};

/// Result type for test helpers.
pub type Result<T> = std::result::Result<T, anyhow::Error>;
