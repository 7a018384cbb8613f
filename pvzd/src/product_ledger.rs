//! Product ledger.
//!
//! Appends products to the open reception of a pickup point and undoes the
//! last scan. Both go through the store's locked open-reception lookup.

use std::sync::Arc;
use tracing::{debug, info};

use pvz_domain::{PickupPointId, Product, ProductDraft, ProductType};
use pvz_store::Store;

use crate::error::PvzResult;
use crate::metrics::Metrics;

/// Records and removes products.
pub struct ProductLedger {
    store: Arc<dyn Store>,
    metrics: Arc<Metrics>,
}

impl ProductLedger {
    /// Create a new ledger over a store.
    pub fn new(store: Arc<dyn Store>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Add a product to the open reception.
    ///
    /// The product type is validated before the store is touched.
    ///
    /// # Errors
    /// - `InvalidProductType` for an unknown type
    /// - `NoOpenReception` if nothing is in progress
    pub async fn append_product(
        &self,
        pickup_point_id: PickupPointId,
        product_type: &str,
    ) -> PvzResult<Product> {
        let product_type: ProductType = product_type.parse()?;
        let draft = ProductDraft::new(product_type);

        let product = self.store.products().append(pickup_point_id, &draft).await?;

        self.metrics.products_added_total.inc();
        info!(
            pvz_id = %pickup_point_id,
            reception_id = %product.reception_id,
            product_id = %product.id,
            product_type = %product.product_type,
            "Product added"
        );

        Ok(product)
    }

    /// Remove the most recently added product of the open reception.
    ///
    /// Returns `None` if the open reception has no products.
    ///
    /// # Errors
    /// - `NoOpenReception` if nothing is in progress
    pub async fn remove_last_product(
        &self,
        pickup_point_id: PickupPointId,
    ) -> PvzResult<Option<Product>> {
        let removed = self.store.products().remove_last(pickup_point_id).await?;

        match &removed {
            Some(product) => info!(
                pvz_id = %pickup_point_id,
                product_id = %product.id,
                "Product removed"
            ),
            None => debug!(pvz_id = %pickup_point_id, "Open reception is empty, nothing to remove"),
        }

        Ok(removed)
    }
}
