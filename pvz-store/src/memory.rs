//! In-memory store implementation
//!
//! Used for testing and development without a database.
//! All tables sit behind a single RwLock; every mutation holds the write
//! guard across its check-and-write, which serializes mutations per store
//! and therefore per pickup point.

use crate::error::{ensure_in_progress, StoreError};
use crate::repository::{
    PickupPointRepository, ProductRepository, ReceptionRepository, Store, UserRepository,
};
use async_trait::async_trait;
use pvz_domain::{
    PickupPoint, PickupPointId, PickupPointQuery, PickupPointView, Product, ProductDraft,
    Reception, ReceptionStatus, ReceptionView, User, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory store for testing
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    // BTreeMap keeps pickup points ordered by id, as the SQL listing does
    pickup_points: BTreeMap<PickupPointId, PickupPoint>,
    receptions: Vec<Reception>,
    products: Vec<StoredProduct>,
    users: HashMap<UserId, User>,
    product_seq: u64,
}

/// Product with insertion sequence number (tie-breaker for equal timestamps)
struct StoredProduct {
    seq: u64,
    product: Product,
}

impl Tables {
    fn open_reception_mut(&mut self, pickup_point_id: PickupPointId) -> Option<&mut Reception> {
        self.receptions
            .iter_mut()
            .find(|r| r.pickup_point_id == pickup_point_id && r.is_open())
    }

    fn open_reception(&self, pickup_point_id: PickupPointId) -> Option<&Reception> {
        self.receptions
            .iter()
            .find(|r| r.pickup_point_id == pickup_point_id && r.is_open())
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }

    /// Get the number of pickup points
    pub fn pickup_point_count(&self) -> usize {
        self.read().map(|t| t.pickup_points.len()).unwrap_or(0)
    }

    /// Get the number of receptions
    pub fn reception_count(&self) -> usize {
        self.read().map(|t| t.receptions.len()).unwrap_or(0)
    }

    /// Get the number of products
    pub fn product_count(&self) -> usize {
        self.read().map(|t| t.products.len()).unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PickupPointRepository for MemoryStore {
    async fn create(&self, point: &PickupPoint) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.pickup_points.contains_key(&point.id) {
            return Err(StoreError::duplicate("pickup_point", point.id.to_string()));
        }
        tables.pickup_points.insert(point.id, point.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: PickupPointId) -> Result<Option<PickupPoint>, StoreError> {
        Ok(self.read()?.pickup_points.get(&id).cloned())
    }

    async fn list_views(
        &self,
        query: &PickupPointQuery,
    ) -> Result<Vec<PickupPointView>, StoreError> {
        let tables = self.read()?;
        let range = query.range;

        let receptions_of = |id: PickupPointId| {
            let mut receptions: Vec<&Reception> = tables
                .receptions
                .iter()
                .filter(|r| r.pickup_point_id == id && range.contains(r.started_at))
                .collect();
            // Stable sort keeps insertion order for equal timestamps
            receptions.sort_by_key(|r| r.started_at);
            receptions
        };

        let views = tables
            .pickup_points
            .values()
            .filter_map(|point| {
                let receptions = receptions_of(point.id);
                if !range.is_unbounded() && receptions.is_empty() {
                    return None;
                }
                Some((point, receptions))
            })
            .skip(usize::try_from(query.page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(query.page.limit()).unwrap_or(usize::MAX))
            .map(|(point, receptions)| PickupPointView {
                point: point.clone(),
                receptions: receptions
                    .into_iter()
                    .map(|reception| {
                        let mut products: Vec<&StoredProduct> = tables
                            .products
                            .iter()
                            .filter(|p| p.product.reception_id == reception.id)
                            .collect();
                        products.sort_by_key(|p| (p.product.added_at, p.seq));
                        ReceptionView {
                            reception: reception.clone(),
                            products: products.into_iter().map(|p| p.product.clone()).collect(),
                        }
                    })
                    .collect(),
            })
            .collect();

        Ok(views)
    }

    async fn list_all(&self) -> Result<Vec<PickupPoint>, StoreError> {
        Ok(self.read()?.pickup_points.values().cloned().collect())
    }
}

#[async_trait]
impl ReceptionRepository for MemoryStore {
    async fn open(&self, reception: &Reception) -> Result<(), StoreError> {
        ensure_in_progress(reception)?;
        let mut tables = self.write()?;
        let pickup_point_id = reception.pickup_point_id;

        if !tables.pickup_points.contains_key(&pickup_point_id) {
            return Err(StoreError::not_found("pickup_point", pickup_point_id.to_string()));
        }
        if tables.open_reception(pickup_point_id).is_some() {
            return Err(StoreError::reception_already_open(pickup_point_id));
        }

        tables.receptions.push(reception.clone());
        Ok(())
    }

    async fn close(&self, pickup_point_id: PickupPointId) -> Result<Reception, StoreError> {
        let mut tables = self.write()?;
        let reception = tables
            .open_reception_mut(pickup_point_id)
            .ok_or_else(|| StoreError::no_open_reception(pickup_point_id))?;

        reception.close()?;
        Ok(reception.clone())
    }

    async fn last_status(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<ReceptionStatus>, StoreError> {
        let tables = self.read()?;
        // max_by_key returns the last maximum, i.e. the latest inserted on ties
        let last = tables
            .receptions
            .iter()
            .filter(|r| r.pickup_point_id == pickup_point_id)
            .max_by_key(|r| r.started_at);

        Ok(last.map(|r| r.status))
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn append(
        &self,
        pickup_point_id: PickupPointId,
        draft: &ProductDraft,
    ) -> Result<Product, StoreError> {
        let mut tables = self.write()?;
        let reception_id = tables
            .open_reception(pickup_point_id)
            .map(|r| r.id)
            .ok_or_else(|| StoreError::no_open_reception(pickup_point_id))?;

        let product = draft.into_product(reception_id);
        tables.product_seq += 1;
        let seq = tables.product_seq;
        tables.products.push(StoredProduct {
            seq,
            product: product.clone(),
        });

        Ok(product)
    }

    async fn remove_last(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Product>, StoreError> {
        let mut tables = self.write()?;
        let reception_id = tables
            .open_reception(pickup_point_id)
            .map(|r| r.id)
            .ok_or_else(|| StoreError::no_open_reception(pickup_point_id))?;

        let last = tables
            .products
            .iter()
            .enumerate()
            .filter(|(_, p)| p.product.reception_id == reception_id)
            .max_by_key(|(_, p)| (p.product.added_at, p.seq))
            .map(|(idx, _)| idx);

        Ok(last.map(|idx| tables.products.remove(idx).product))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables
            .users
            .values()
            .any(|u| u.email.as_str() == user.email.as_str())
        {
            return Err(StoreError::duplicate("user", user.email.as_str()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email.as_str() == email)
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&id).cloned())
    }
}

impl Store for MemoryStore {
    fn pickup_points(&self) -> &dyn PickupPointRepository {
        self
    }

    fn receptions(&self) -> &dyn ReceptionRepository {
        self
    }

    fn products(&self) -> &dyn ProductRepository {
        self
    }

    fn users(&self) -> &dyn UserRepository {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pvz_domain::{City, DateRange, Email, PageRequest, ProductType, UserRole};
    use std::sync::Arc;

    async fn seed_point(store: &MemoryStore) -> PickupPoint {
        let point = PickupPoint::new(None, None, City::Moscow);
        store.pickup_points().create(&point).await.unwrap();
        point
    }

    async fn open(store: &MemoryStore, point: &PickupPoint) -> Reception {
        let reception = Reception::open(point.id);
        store.receptions().open(&reception).await.unwrap();
        reception
    }

    #[tokio::test]
    async fn test_pickup_point_create_and_find() {
        let store = MemoryStore::new();
        let point = seed_point(&store).await;

        let found = store.pickup_points().find_by_id(point.id).await.unwrap();
        assert_eq!(found, Some(point));
        assert_eq!(store.pickup_point_count(), 1);
    }

    #[tokio::test]
    async fn test_pickup_point_duplicate_rejected() {
        let store = MemoryStore::new();
        let point = seed_point(&store).await;
        let clash = PickupPoint::new(Some(point.id), None, City::Kazan);

        let result = store.pickup_points().create(&clash).await;
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));

        let stored = store.pickup_points().find_by_id(point.id).await.unwrap().unwrap();
        assert_eq!(stored.city, City::Moscow);
        assert_eq!(store.pickup_point_count(), 1);
    }

    #[tokio::test]
    async fn test_open_requires_pickup_point() {
        let store = MemoryStore::new();
        let reception = Reception::open(uuid::Uuid::now_v7());

        let result = store.receptions().open(&reception).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_second_open_rejected() {
        let store = MemoryStore::new();
        let point = seed_point(&store).await;
        open(&store, &point).await;

        let result = store.receptions().open(&Reception::open(point.id)).await;
        assert!(matches!(result, Err(StoreError::ReceptionAlreadyOpen { .. })));
        assert_eq!(store.reception_count(), 1);
    }

    #[tokio::test]
    async fn test_close_then_reopen() {
        let store = MemoryStore::new();
        let point = seed_point(&store).await;
        let first = open(&store, &point).await;

        let closed = store.receptions().close(point.id).await.unwrap();
        assert_eq!(closed.id, first.id);
        assert_eq!(closed.status, ReceptionStatus::Closed);

        let result = store.receptions().close(point.id).await;
        assert!(matches!(result, Err(StoreError::NoOpenReception { .. })));

        open(&store, &point).await;
        let status = store.receptions().last_status(point.id).await.unwrap();
        assert_eq!(status, Some(ReceptionStatus::InProgress));
    }

    #[tokio::test]
    async fn test_last_status_none_without_receptions() {
        let store = MemoryStore::new();
        let point = seed_point(&store).await;

        let status = store.receptions().last_status(point.id).await.unwrap();
        assert_eq!(status, None);
    }

    #[tokio::test]
    async fn test_append_requires_open_reception() {
        let store = MemoryStore::new();
        let point = seed_point(&store).await;
        let draft = ProductDraft::new(ProductType::Shoes);

        let result = store.products().append(point.id, &draft).await;
        assert!(matches!(result, Err(StoreError::NoOpenReception { .. })));

        open(&store, &point).await;
        store.receptions().close(point.id).await.unwrap();

        let result = store.products().append(point.id, &draft).await;
        assert!(matches!(result, Err(StoreError::NoOpenReception { .. })));
        assert_eq!(store.product_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_last_is_lifo() {
        let store = MemoryStore::new();
        let point = seed_point(&store).await;
        let reception = open(&store, &point).await;

        let mut added = Vec::new();
        for product_type in [ProductType::Electronics, ProductType::Clothes, ProductType::Shoes] {
            let product = store
                .products()
                .append(point.id, &ProductDraft::new(product_type))
                .await
                .unwrap();
            assert_eq!(product.reception_id, reception.id);
            added.push(product);
        }

        for expected in added.iter().rev() {
            let removed = store.products().remove_last(point.id).await.unwrap();
            assert_eq!(removed.as_ref(), Some(expected));
        }

        let removed = store.products().remove_last(point.id).await.unwrap();
        assert_eq!(removed, None);
    }

    #[tokio::test]
    async fn test_remove_last_ignores_closed_receptions() {
        let store = MemoryStore::new();
        let point = seed_point(&store).await;

        open(&store, &point).await;
        store
            .products()
            .append(point.id, &ProductDraft::new(ProductType::Shoes))
            .await
            .unwrap();
        store.receptions().close(point.id).await.unwrap();
        open(&store, &point).await;

        let removed = store.products().remove_last(point.id).await.unwrap();
        assert_eq!(removed, None);
        assert_eq!(store.product_count(), 1);
    }

    #[tokio::test]
    async fn test_append_stamps_in_commit_order() {
        let store = MemoryStore::new();
        let point = seed_point(&store).await;
        open(&store, &point).await;

        // Drafted first, committed second
        let late = ProductDraft::new(ProductType::Shoes);
        let early = ProductDraft::new(ProductType::Clothes);

        let first = store.products().append(point.id, &early).await.unwrap();
        let second = store.products().append(point.id, &late).await.unwrap();
        assert!(first.added_at <= second.added_at);

        let removed = store.products().remove_last(point.id).await.unwrap().unwrap();
        assert_eq!(removed.id, late.id);
    }

    #[tokio::test]
    async fn test_open_rejects_closed_reception() {
        let store = MemoryStore::new();
        let point = seed_point(&store).await;
        let mut closed = Reception::open(point.id);
        closed.status = ReceptionStatus::Closed;

        let result = store.receptions().open(&closed).await;
        assert!(matches!(result, Err(StoreError::Domain(_))));
        assert_eq!(store.reception_count(), 0);
    }

    #[tokio::test]
    async fn test_list_views_paginates_by_id() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            seed_point(&store).await;
        }

        let mut seen = Vec::new();
        for page in 1..=5 {
            let query = PickupPointQuery {
                page: PageRequest::new(Some(1), Some(page)).unwrap(),
                range: DateRange::unbounded(),
            };
            let views = store.pickup_points().list_views(&query).await.unwrap();
            assert_eq!(views.len(), 1);
            seen.push(views[0].point.id);
        }

        let mut sorted = seen.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(seen, sorted);

        let beyond = PickupPointQuery {
            page: PageRequest::new(Some(1), Some(6)).unwrap(),
            range: DateRange::unbounded(),
        };
        assert!(store.pickup_points().list_views(&beyond).await.unwrap().is_empty());

        let far = PickupPointQuery {
            page: PageRequest::new(Some(30), Some(i64::MAX)).unwrap(),
            range: DateRange::unbounded(),
        };
        assert!(store.pickup_points().list_views(&far).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_views_date_filter() {
        let store = MemoryStore::new();
        let busy = seed_point(&store).await;
        let idle = seed_point(&store).await;

        let mut old = Reception::open(busy.id);
        old.started_at = Utc::now() - Duration::days(10);
        store.receptions().open(&old).await.unwrap();
        store.receptions().close(busy.id).await.unwrap();
        let recent = open(&store, &busy).await;
        store
            .products()
            .append(busy.id, &ProductDraft::new(ProductType::Electronics))
            .await
            .unwrap();

        let query = PickupPointQuery {
            page: PageRequest::default(),
            range: DateRange::new(Some(Utc::now() - Duration::days(1)), None).unwrap(),
        };
        let views = store.pickup_points().list_views(&query).await.unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].point.id, busy.id);
        assert_eq!(views[0].receptions.len(), 1);
        assert_eq!(views[0].receptions[0].reception.id, recent.id);
        assert_eq!(views[0].receptions[0].products.len(), 1);

        let all = store
            .pickup_points()
            .list_views(&PickupPointQuery::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|v| v.point.id == idle.id && v.receptions.is_empty()));
    }

    #[tokio::test]
    async fn test_users_unique_email() {
        let store = MemoryStore::new();
        let email = Email::parse("user@example.com").unwrap();
        let user = User::new(email.clone(), String::new(), UserRole::Employee);
        store.users().create(&user).await.unwrap();

        let clash = User::new(email, String::new(), UserRole::Moderator);
        let result = store.users().create(&clash).await;
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));

        let found = store.users().find_by_email("user@example.com").await.unwrap();
        assert_eq!(found, Some(user.clone()));
        assert_eq!(store.users().find_by_id(user.id).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_concurrent_open_admits_exactly_one() {
        let store = Arc::new(MemoryStore::new());
        let point_id = seed_point(&store).await.id;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            tasks.spawn(async move { store.receptions().open(&Reception::open(point_id)).await });
        }

        let mut ok = 0;
        let mut rejected = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(()) => ok += 1,
                Err(StoreError::ReceptionAlreadyOpen { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(rejected, 15);
    }
}
