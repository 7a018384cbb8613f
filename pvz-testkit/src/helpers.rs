//! Seeding helpers.

use chrono::{DateTime, Utc};
use pvz_domain::{
    City, PickupPoint, PickupPointId, Product, ProductDraft, ProductType, Reception,
    ReceptionStatus,
};
use pvz_store::Store;

use crate::Result;

/// Create a pickup point with generated id and registration date.
pub async fn seed_pickup_point(store: &dyn Store, city: City) -> Result<PickupPoint> {
    let point = PickupPoint::new(None, None, city);
    store.pickup_points().create(&point).await?;
    Ok(point)
}

/// Open a reception at the pickup point, stamped now.
pub async fn seed_open_reception(store: &dyn Store, pickup_point_id: PickupPointId) -> Result<Reception> {
    let reception = Reception::open(pickup_point_id);
    store.receptions().open(&reception).await?;
    Ok(reception)
}

/// Open and immediately close a reception.
pub async fn seed_closed_reception(
    store: &dyn Store,
    pickup_point_id: PickupPointId,
) -> Result<Reception> {
    seed_open_reception(store, pickup_point_id).await?;
    Ok(store.receptions().close(pickup_point_id).await?)
}

/// Open a reception with an explicit start time, closing it when `status`
/// is `Closed`.
///
/// Used to build history for date-filtered listings.
pub async fn seed_reception_at(
    store: &dyn Store,
    pickup_point_id: PickupPointId,
    started_at: DateTime<Utc>,
    status: ReceptionStatus,
) -> Result<Reception> {
    let mut reception = Reception::open(pickup_point_id);
    reception.started_at = started_at;
    store.receptions().open(&reception).await?;

    match status {
        ReceptionStatus::InProgress => Ok(reception),
        ReceptionStatus::Closed => Ok(store.receptions().close(pickup_point_id).await?),
    }
}

/// Append products of the given types to the open reception, in order.
pub async fn seed_products(
    store: &dyn Store,
    pickup_point_id: PickupPointId,
    types: &[ProductType],
) -> Result<Vec<Product>> {
    let mut products = Vec::with_capacity(types.len());
    for product_type in types {
        let product = store
            .products()
            .append(pickup_point_id, &ProductDraft::new(*product_type))
            .await?;
        products.push(product);
    }
    Ok(products)
}
