//! Pickup point registry.
//!
//! Creates pickup points and serves the composite listing. All parameters
//! are validated before the store is queried.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use pvz_domain::{
    City, DateRange, PageRequest, PickupPoint, PickupPointId, PickupPointQuery, PickupPointView,
};
use pvz_store::{Store, StoreError};

use crate::error::{PvzError, PvzResult};
use crate::metrics::Metrics;

/// Raw listing parameters as received from a caller
#[derive(Debug, Clone, Copy, Default)]
pub struct ListPickupPoints {
    /// Page size (default 10)
    pub limit: Option<i64>,
    /// One-based page number (default 1)
    pub page: Option<i64>,
    /// Lower bound on reception start time
    pub start: Option<DateTime<Utc>>,
    /// Upper bound on reception start time
    pub end: Option<DateTime<Utc>>,
}

impl ListPickupPoints {
    /// Validate into a store query
    pub fn validate(&self) -> PvzResult<PickupPointQuery> {
        let page = PageRequest::new(self.limit, self.page)?;
        let range = DateRange::new(self.start, self.end)?;
        Ok(PickupPointQuery { page, range })
    }
}

/// Registers and lists pickup points.
pub struct PickupPointRegistry {
    store: Arc<dyn Store>,
    metrics: Arc<Metrics>,
}

impl PickupPointRegistry {
    /// Create a new registry over a store.
    pub fn new(store: Arc<dyn Store>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Register a pickup point.
    ///
    /// # Errors
    /// - `InvalidCity` for an unknown city (checked first)
    /// - `PickupPointExists` if the id is taken
    pub async fn create_pickup_point(
        &self,
        id: Option<PickupPointId>,
        registration_date: Option<DateTime<Utc>>,
        city: &str,
    ) -> PvzResult<PickupPoint> {
        let city: City = city.parse()?;
        let point = PickupPoint::new(id, registration_date, city);

        match self.store.pickup_points().create(&point).await {
            Ok(()) => {},
            Err(StoreError::Duplicate { .. }) => {
                return Err(PvzError::PickupPointExists(point.id));
            },
            Err(e) => return Err(e.into()),
        }

        self.metrics.pvz_created_total.inc();
        info!(pvz_id = %point.id, city = %point.city, "Pickup point created");

        Ok(point)
    }

    /// Composite listing of pickup points with receptions and products.
    ///
    /// # Errors
    /// - `InvalidLimit`, `InvalidPage`, `InvalidDateRange` before any query
    pub async fn list_pickup_points(
        &self,
        params: ListPickupPoints,
    ) -> PvzResult<Vec<PickupPointView>> {
        let query = params.validate()?;
        let views = self.store.pickup_points().list_views(&query).await?;

        debug!(
            page = query.page.page(),
            limit = query.page.limit(),
            count = views.len(),
            "Listed pickup points"
        );

        Ok(views)
    }

    /// Every pickup point, ordered by id.
    pub async fn list_all_pickup_points(&self) -> PvzResult<Vec<PickupPoint>> {
        Ok(self.store.pickup_points().list_all().await?)
    }
}
