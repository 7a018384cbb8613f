//! Reception lifecycle engine.
//!
//! Sole writer of reception status. Keeps at most one reception in progress
//! per pickup point; the store performs the locked check-and-insert.

use std::sync::Arc;
use tracing::{debug, info};

use pvz_domain::{PickupPointId, Reception, ReceptionStatus};
use pvz_store::{Store, StoreError};

use crate::error::{PvzError, PvzResult};
use crate::metrics::Metrics;

/// Opens and closes receptions.
pub struct ReceptionEngine {
    store: Arc<dyn Store>,
    metrics: Arc<Metrics>,
}

impl ReceptionEngine {
    /// Create a new engine over a store.
    pub fn new(store: Arc<dyn Store>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Open a new in-progress reception.
    ///
    /// # Errors
    /// - `ReceptionAlreadyOpen` if one is already in progress
    /// - `PickupPointNotFound` if the pickup point does not exist
    pub async fn open_reception(&self, pickup_point_id: PickupPointId) -> PvzResult<Reception> {
        let reception = Reception::open(pickup_point_id);

        match self.store.receptions().open(&reception).await {
            Ok(()) => {},
            Err(StoreError::NotFound { .. }) => {
                return Err(PvzError::PickupPointNotFound(pickup_point_id));
            },
            Err(e) => return Err(e.into()),
        }

        self.metrics.reception_created_total.inc();
        info!(
            pvz_id = %pickup_point_id,
            reception_id = %reception.id,
            "Reception opened"
        );

        Ok(reception)
    }

    /// Close the in-progress reception and return it.
    ///
    /// # Errors
    /// - `NoOpenReception` if nothing is in progress
    pub async fn close_reception(&self, pickup_point_id: PickupPointId) -> PvzResult<Reception> {
        let reception = self.store.receptions().close(pickup_point_id).await?;

        info!(
            pvz_id = %pickup_point_id,
            reception_id = %reception.id,
            "Reception closed"
        );

        Ok(reception)
    }

    /// Status of the most recently started reception.
    ///
    /// # Errors
    /// - `NoReceptionFound` if the pickup point never had one
    pub async fn last_reception_status(
        &self,
        pickup_point_id: PickupPointId,
    ) -> PvzResult<ReceptionStatus> {
        let status = self
            .store
            .receptions()
            .last_status(pickup_point_id)
            .await?
            .ok_or(PvzError::NoReceptionFound(pickup_point_id))?;

        debug!(pvz_id = %pickup_point_id, %status, "Last reception status");
        Ok(status)
    }
}
