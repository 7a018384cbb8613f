//! PostgreSQL store tests.
//!
//! Each test gets a fresh database with the workspace migrations applied.
//!
//! Run with: `DATABASE_URL=postgres://... cargo test -p pvzd --features postgres --test postgres_store -- --ignored`

#![cfg(feature = "postgres")]

use std::sync::Arc;

use chrono::{Duration, Utc};
use std::collections::HashSet;

use pvz_domain::{
    City, DateRange, Email, PageRequest, PickupPoint, PickupPointId, PickupPointQuery, Product,
    ProductDraft, ProductType, Reception, ReceptionStatus, User, UserRole,
};
use pvz_store::{PgStore, Store, StoreError};
use pvz_testkit::{seed_closed_reception, seed_open_reception, seed_pickup_point, seed_products};
use pvzd::{Metrics, ProductLedger, PvzError, ReceptionEngine};
use sqlx::PgPool;
use tokio::task::JoinSet;

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_pickup_point_round_trip(pool: PgPool) {
    let store = PgStore::new(pool);
    let date = Utc::now() - Duration::days(2);
    let point = PickupPoint::new(None, Some(date), City::SaintPetersburg);

    store.pickup_points().create(&point).await.unwrap();
    let err = store.pickup_points().create(&point).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { .. }));

    let found = store.pickup_points().find_by_id(point.id).await.unwrap().unwrap();
    assert_eq!(found.id, point.id);
    assert_eq!(found.city, City::SaintPetersburg);
    // Postgres keeps microseconds
    assert!((found.registration_date - date).num_milliseconds().abs() < 1);

    assert_eq!(store.pickup_points().list_all().await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_single_open_reception_under_contention(pool: PgPool) {
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let metrics = Arc::new(Metrics::new().unwrap());
    let engine = Arc::new(ReceptionEngine::new(store.clone(), metrics));
    let point = seed_pickup_point(store.as_ref(), City::Moscow).await.unwrap();
    let point_id = point.id;

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let engine = engine.clone();
        tasks.spawn(async move { engine.open_reception(point_id).await });
    }

    let mut opened = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => opened += 1,
            Err(PvzError::ReceptionAlreadyOpen(_)) => {},
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(opened, 1);
    assert_eq!(
        store.receptions().last_status(point_id).await.unwrap(),
        Some(ReceptionStatus::InProgress)
    );
}

fn services(store: &Arc<dyn Store>) -> (Arc<ReceptionEngine>, Arc<ProductLedger>) {
    let metrics = Arc::new(Metrics::new().unwrap());
    (
        Arc::new(ReceptionEngine::new(store.clone(), metrics.clone())),
        Arc::new(ProductLedger::new(store.clone(), metrics)),
    )
}

/// Products of every reception of one pickup point, keyed by reception id
async fn products_by_reception(
    store: &dyn Store,
    pickup_point_id: PickupPointId,
) -> Vec<(uuid::Uuid, Vec<Product>)> {
    let views = store
        .pickup_points()
        .list_views(&PickupPointQuery::default())
        .await
        .unwrap();
    views
        .into_iter()
        .filter(|v| v.point.id == pickup_point_id)
        .flat_map(|v| v.receptions)
        .map(|r| (r.reception.id, r.products))
        .collect()
}

enum Outcome {
    Appended(Result<Product, PvzError>),
    Closed(Result<Reception, PvzError>),
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_appends_racing_close_land_before_it(pool: PgPool) {
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let (engine, ledger) = services(&store);
    let point = seed_pickup_point(store.as_ref(), City::Moscow).await.unwrap();
    let point_id = point.id;
    let reception = seed_open_reception(store.as_ref(), point_id).await.unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..20 {
        let ledger = ledger.clone();
        tasks.spawn(async move { Outcome::Appended(ledger.append_product(point_id, "shoes").await) });
        if i == 10 {
            let engine = engine.clone();
            tasks.spawn(async move { Outcome::Closed(engine.close_reception(point_id).await) });
        }
    }

    let mut appended = HashSet::new();
    let mut refused = 0;
    let mut closed = None;
    while let Some(outcome) = tasks.join_next().await {
        match outcome.unwrap() {
            Outcome::Appended(Ok(product)) => {
                assert_eq!(product.reception_id, reception.id);
                appended.insert(product.id);
            },
            Outcome::Appended(Err(PvzError::NoOpenReception(id))) => {
                assert_eq!(id, point_id);
                refused += 1;
            },
            Outcome::Appended(Err(e)) => panic!("unexpected append error: {e}"),
            Outcome::Closed(result) => closed = Some(result.unwrap()),
        }
    }

    let closed = closed.unwrap();
    assert_eq!(closed.id, reception.id);
    assert_eq!(closed.status, ReceptionStatus::Closed);
    assert_eq!(appended.len() + refused, 20);

    // Exactly the acknowledged products are stored, all in the closed reception
    let stored = products_by_reception(store.as_ref(), point_id).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, reception.id);
    let stored_ids: HashSet<_> = stored[0].1.iter().map(|p| p.id).collect();
    assert_eq!(stored_ids, appended);

    let err = ledger.append_product(point_id, "shoes").await.unwrap_err();
    assert!(matches!(err, PvzError::NoOpenReception(_)));
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_removes_racing_appends_keep_count(pool: PgPool) {
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let (_, ledger) = services(&store);
    let point = seed_pickup_point(store.as_ref(), City::Kazan).await.unwrap();
    let point_id = point.id;
    let reception = seed_open_reception(store.as_ref(), point_id).await.unwrap();
    let seeded = seed_products(store.as_ref(), point_id, &[ProductType::Clothes; 10])
        .await
        .unwrap();

    let mut appends = JoinSet::new();
    let mut removes = JoinSet::new();
    for _ in 0..15 {
        let append_ledger = ledger.clone();
        appends.spawn(async move { append_ledger.append_product(point_id, "electronics").await });
        let remove_ledger = ledger.clone();
        removes.spawn(async move { remove_ledger.remove_last_product(point_id).await });
    }

    let mut appended = HashSet::new();
    while let Some(result) = appends.join_next().await {
        appended.insert(result.unwrap().unwrap().id);
    }
    let mut removed = HashSet::new();
    while let Some(result) = removes.join_next().await {
        if let Some(product) = result.unwrap().unwrap() {
            assert_eq!(product.reception_id, reception.id);
            // Each product is removed at most once
            assert!(removed.insert(product.id));
        }
    }

    let stored = products_by_reception(store.as_ref(), point_id).await;
    assert_eq!(stored.len(), 1);
    let stored_ids: HashSet<_> = stored[0].1.iter().map(|p| p.id).collect();
    assert_eq!(stored_ids.len(), seeded.len() + appended.len() - removed.len());

    let mut expected: HashSet<_> = seeded.iter().map(|p| p.id).collect();
    expected.extend(appended);
    let expected: HashSet<_> = expected.difference(&removed).copied().collect();
    assert_eq!(stored_ids, expected);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_open_rejects_closed_reception(pool: PgPool) {
    let store = PgStore::new(pool);
    let point = seed_pickup_point(&store, City::Moscow).await.unwrap();
    let mut closed = Reception::open(point.id);
    closed.status = ReceptionStatus::Closed;

    let err = store.receptions().open(&closed).await.unwrap_err();
    assert!(matches!(err, StoreError::Domain(_)));
    assert_eq!(store.receptions().last_status(point.id).await.unwrap(), None);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_open_requires_pickup_point(pool: PgPool) {
    let store = PgStore::new(pool);
    let missing = Reception::open(uuid::Uuid::now_v7());

    let err = store.receptions().open(&missing).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_lifo_and_gating(pool: PgPool) {
    let store = PgStore::new(pool);
    let point = seed_pickup_point(&store, City::Kazan).await.unwrap();

    let err = store
        .products()
        .append(point.id, &ProductDraft::new(ProductType::Shoes))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NoOpenReception { .. }));

    seed_open_reception(&store, point.id).await.unwrap();
    let added = seed_products(
        &store,
        point.id,
        &[ProductType::Electronics, ProductType::Clothes, ProductType::Shoes],
    )
    .await
    .unwrap();

    for expected in added.iter().rev() {
        let removed = store.products().remove_last(point.id).await.unwrap();
        assert_eq!(removed.map(|p| p.id), Some(expected.id));
    }
    assert!(store.products().remove_last(point.id).await.unwrap().is_none());

    let closed = store.receptions().close(point.id).await.unwrap();
    assert_eq!(closed.status, ReceptionStatus::Closed);

    let err = store.products().remove_last(point.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NoOpenReception { .. }));
    let err = store.receptions().close(point.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NoOpenReception { .. }));
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_listing_pages_and_nesting(pool: PgPool) {
    let store = PgStore::new(pool);
    let a = seed_pickup_point(&store, City::Moscow).await.unwrap();
    let b = seed_pickup_point(&store, City::Kazan).await.unwrap();

    seed_closed_reception(&store, a.id).await.unwrap();
    let open = seed_open_reception(&store, a.id).await.unwrap();
    seed_products(&store, a.id, &[ProductType::Clothes, ProductType::Shoes])
        .await
        .unwrap();

    let everything = PickupPointQuery::default();
    let views = store.pickup_points().list_views(&everything).await.unwrap();
    assert_eq!(views.len(), 2);
    let view_a = views.iter().find(|v| v.point.id == a.id).unwrap();
    assert_eq!(view_a.receptions.len(), 2);
    let open_view = view_a
        .receptions
        .iter()
        .find(|r| r.reception.id == open.id)
        .unwrap();
    let types: Vec<_> = open_view.products.iter().map(|p| p.product_type).collect();
    assert_eq!(types, vec![ProductType::Clothes, ProductType::Shoes]);

    let page = |n| PickupPointQuery {
        page: PageRequest::new(Some(1), Some(n)).unwrap(),
        range: DateRange::unbounded(),
    };
    let first = store.pickup_points().list_views(&page(1)).await.unwrap();
    let second = store.pickup_points().list_views(&page(2)).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0].point.id, second[0].point.id);

    let far = PickupPointQuery {
        page: PageRequest::new(Some(30), Some(i64::MAX)).unwrap(),
        range: DateRange::unbounded(),
    };
    assert!(store.pickup_points().list_views(&far).await.unwrap().is_empty());

    // Only `a` has receptions in range
    let recent = PickupPointQuery {
        page: PageRequest::default(),
        range: DateRange::new(Some(Utc::now() - Duration::hours(1)), None).unwrap(),
    };
    let views = store.pickup_points().list_views(&recent).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].point.id, a.id);
    assert_ne!(views[0].point.id, b.id);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_users_unique_by_email(pool: PgPool) {
    let store = PgStore::new(pool);
    let user = User::new(
        Email::parse("clerk@example.com").unwrap(),
        String::new(),
        UserRole::Employee,
    );

    store.users().create(&user).await.unwrap();
    let twin = User::new(user.email.clone(), String::new(), UserRole::Moderator);
    let err = store.users().create(&twin).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { .. }));

    let by_email = store
        .users()
        .find_by_email("clerk@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, user.id);
    assert_eq!(by_email.role, UserRole::Employee);
    assert!(store.users().find_by_id(twin.id).await.unwrap().is_none());
}
