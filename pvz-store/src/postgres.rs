//! PostgreSQL store implementation.
//!
//! Reception and product mutations run in one transaction each and take
//! locks in a fixed order:
//! 1. the pickup point row (`SELECT ... FROM pickup_point ... FOR UPDATE`)
//! 2. the in-progress reception row (`... status = 'in_progress' ... FOR UPDATE`)
//!
//! The partial unique index `reception_one_in_progress` backs the
//! single-open-reception rule at the schema level.
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.

use crate::error::{ensure_in_progress, is_unique_violation, StoreError};
use crate::repository::{
    PickupPointRepository, ProductRepository, ReceptionRepository, Store, UserRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pvz_domain::{
    group_join_rows, City, Email, JoinRow, PickupPoint, PickupPointId, PickupPointQuery,
    PickupPointView, Product, ProductDraft, ProductType, Reception, ReceptionStatus, User,
    UserId, UserRole,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| StoreError::Transaction(format!("Failed to begin: {}", e)))
    }
}

async fn commit(tx: Transaction<'_, Postgres>) -> Result<(), StoreError> {
    tx.commit()
        .await
        .map_err(|e| StoreError::Transaction(format!("Failed to commit: {}", e)))
}

// =============================================================================
// Locking helpers
// =============================================================================

/// Take the per-pickup-point lock. Returns false if the pickup point does not exist.
async fn lock_pickup_point(
    tx: &mut Transaction<'_, Postgres>,
    pickup_point_id: PickupPointId,
) -> Result<bool, StoreError> {
    let row = sqlx::query("SELECT id FROM pickup_point WHERE id = $1 FOR UPDATE")
        .bind(pickup_point_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row.is_some())
}

/// Locking read of the in-progress reception of a pickup point
async fn find_open_reception(
    tx: &mut Transaction<'_, Postgres>,
    pickup_point_id: PickupPointId,
) -> Result<Option<Reception>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT id, started_at, pickup_point_id, status
        FROM reception
        WHERE pickup_point_id = $1 AND status = 'in_progress'
        ORDER BY started_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(pickup_point_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.as_ref().map(parse_reception).transpose()
}

/// Lock the pickup point and resolve its open reception, or fail with
/// `NoOpenReception`.
async fn lock_open_reception(
    tx: &mut Transaction<'_, Postgres>,
    pickup_point_id: PickupPointId,
) -> Result<Reception, StoreError> {
    if !lock_pickup_point(tx, pickup_point_id).await? {
        return Err(StoreError::no_open_reception(pickup_point_id));
    }

    find_open_reception(tx, pickup_point_id)
        .await?
        .ok_or_else(|| StoreError::no_open_reception(pickup_point_id))
}

// =============================================================================
// Row parsing
// =============================================================================

fn decode<T, E>(column: &str, raw: &str, parsed: Result<T, E>) -> Result<T, StoreError>
where
    E: std::fmt::Display,
{
    parsed.map_err(|e| StoreError::Deserialization(format!("Invalid {} {}: {}", column, raw, e)))
}

fn parse_point(row: &PgRow) -> Result<PickupPoint, StoreError> {
    let city: String = row.try_get("city")?;
    Ok(PickupPoint {
        id: row.try_get("id")?,
        registration_date: row.try_get("registration_date")?,
        city: decode("city", &city, city.parse::<City>())?,
    })
}

fn parse_reception(row: &PgRow) -> Result<Reception, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(Reception {
        id: row.try_get("id")?,
        started_at: row.try_get("started_at")?,
        pickup_point_id: row.try_get("pickup_point_id")?,
        status: decode("status", &status, status.parse::<ReceptionStatus>())?,
    })
}

fn parse_product(row: &PgRow) -> Result<Product, StoreError> {
    let product_type: String = row.try_get("product_type")?;
    Ok(Product {
        id: row.try_get("id")?,
        added_at: row.try_get("added_at")?,
        product_type: decode("product_type", &product_type, product_type.parse::<ProductType>())?,
        reception_id: row.try_get("reception_id")?,
    })
}

fn parse_user(row: &PgRow) -> Result<User, StoreError> {
    let email: String = row.try_get("email")?;
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: decode("email", &email, Email::parse(&email))?,
        password_hash: row.try_get("password_hash")?,
        role: decode("role", &role, role.parse::<UserRole>())?,
    })
}

/// Parse one row of the composite listing join
fn parse_join_row(row: &PgRow) -> Result<JoinRow, StoreError> {
    let city: String = row.try_get("city")?;
    let point = PickupPoint {
        id: row.try_get("pvz_id")?,
        registration_date: row.try_get("registration_date")?,
        city: decode("city", &city, city.parse::<City>())?,
    };

    let reception_id: Option<Uuid> = row.try_get("reception_id")?;
    let reception = match reception_id {
        Some(id) => {
            let status: String = row.try_get("status")?;
            Some(Reception {
                id,
                started_at: row.try_get("started_at")?,
                pickup_point_id: point.id,
                status: decode("status", &status, status.parse::<ReceptionStatus>())?,
            })
        },
        None => None,
    };

    let product_id: Option<Uuid> = row.try_get("product_id")?;
    let product = match (product_id, reception_id) {
        (Some(id), Some(reception_id)) => {
            let product_type: String = row.try_get("product_type")?;
            Some(Product {
                id,
                added_at: row.try_get("added_at")?,
                product_type: decode(
                    "product_type",
                    &product_type,
                    product_type.parse::<ProductType>(),
                )?,
                reception_id,
            })
        },
        _ => None,
    };

    Ok(JoinRow {
        point,
        reception,
        product,
    })
}

// =============================================================================
// PickupPointRepository
// =============================================================================

#[async_trait]
impl PickupPointRepository for PgStore {
    async fn create(&self, point: &PickupPoint) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO pickup_point (id, registration_date, city)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(point.id)
        .bind(point.registration_date)
        .bind(point.city.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::duplicate("pickup_point", point.id.to_string()))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: PickupPointId) -> Result<Option<PickupPoint>, StoreError> {
        let row = sqlx::query("SELECT id, registration_date, city FROM pickup_point WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(parse_point).transpose()
    }

    async fn list_views(
        &self,
        query: &PickupPointQuery,
    ) -> Result<Vec<PickupPointView>, StoreError> {
        let start: Option<DateTime<Utc>> = query.range.start();
        let end: Option<DateTime<Utc>> = query.range.end();

        // The page CTE picks pickup points first so LIMIT/OFFSET count
        // pickup points rather than join rows.
        let rows = sqlx::query(
            r#"
            WITH page AS (
                SELECT p.id, p.registration_date, p.city
                FROM pickup_point p
                WHERE ($1::timestamptz IS NULL AND $2::timestamptz IS NULL)
                   OR EXISTS (
                        SELECT 1 FROM reception r
                        WHERE r.pickup_point_id = p.id
                          AND ($1::timestamptz IS NULL OR r.started_at >= $1)
                          AND ($2::timestamptz IS NULL OR r.started_at <= $2)
                   )
                ORDER BY p.id
                LIMIT $3 OFFSET $4
            )
            SELECT
                page.id AS pvz_id,
                page.registration_date,
                page.city,
                r.id AS reception_id,
                r.started_at,
                r.status,
                pr.id AS product_id,
                pr.added_at,
                pr.product_type
            FROM page
            LEFT JOIN reception r
                ON r.pickup_point_id = page.id
               AND ($1::timestamptz IS NULL OR r.started_at >= $1)
               AND ($2::timestamptz IS NULL OR r.started_at <= $2)
            LEFT JOIN product pr ON pr.reception_id = r.id
            ORDER BY page.id, r.started_at, r.id, pr.added_at, pr.id
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(query.page.limit())
        .bind(query.page.offset())
        .fetch_all(&self.pool)
        .await?;

        let join_rows = rows
            .iter()
            .map(parse_join_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(group_join_rows(join_rows))
    }

    async fn list_all(&self) -> Result<Vec<PickupPoint>, StoreError> {
        let rows = sqlx::query("SELECT id, registration_date, city FROM pickup_point ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(parse_point).collect()
    }
}

// =============================================================================
// ReceptionRepository
// =============================================================================

#[async_trait]
impl ReceptionRepository for PgStore {
    async fn open(&self, reception: &Reception) -> Result<(), StoreError> {
        ensure_in_progress(reception)?;
        let pickup_point_id = reception.pickup_point_id;
        let mut tx = self.begin().await?;

        if !lock_pickup_point(&mut tx, pickup_point_id).await? {
            return Err(StoreError::not_found("pickup_point", pickup_point_id.to_string()));
        }

        if let Some(open) = find_open_reception(&mut tx, pickup_point_id).await? {
            debug!(pickup_point_id = %pickup_point_id, reception_id = %open.id, "Open reception exists");
            return Err(StoreError::reception_already_open(pickup_point_id));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO reception (id, started_at, pickup_point_id, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(reception.id)
        .bind(reception.started_at)
        .bind(pickup_point_id)
        .bind(reception.status.as_str())
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {},
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::reception_already_open(pickup_point_id));
            },
            Err(e) => return Err(e.into()),
        }

        commit(tx).await
    }

    async fn close(&self, pickup_point_id: PickupPointId) -> Result<Reception, StoreError> {
        let mut tx = self.begin().await?;
        let open = lock_open_reception(&mut tx, pickup_point_id).await?;

        let row = sqlx::query(
            r#"
            UPDATE reception
            SET status = 'closed'
            WHERE id = $1
            RETURNING id, started_at, pickup_point_id, status
            "#,
        )
        .bind(open.id)
        .fetch_one(&mut *tx)
        .await?;

        let closed = parse_reception(&row)?;
        commit(tx).await?;
        Ok(closed)
    }

    async fn last_status(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<ReceptionStatus>, StoreError> {
        let status: Option<String> = sqlx::query_scalar(
            r#"
            SELECT status
            FROM reception
            WHERE pickup_point_id = $1
            ORDER BY started_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(pickup_point_id)
        .fetch_optional(&self.pool)
        .await?;

        status
            .map(|s| decode("status", &s, s.parse::<ReceptionStatus>()))
            .transpose()
    }
}

// =============================================================================
// ProductRepository
// =============================================================================

#[async_trait]
impl ProductRepository for PgStore {
    async fn append(
        &self,
        pickup_point_id: PickupPointId,
        draft: &ProductDraft,
    ) -> Result<Product, StoreError> {
        let mut tx = self.begin().await?;
        let open = lock_open_reception(&mut tx, pickup_point_id).await?;

        // Stamped by the database while the reception lock is held
        let row = sqlx::query(
            r#"
            INSERT INTO product (id, added_at, product_type, reception_id)
            VALUES ($1, clock_timestamp(), $2, $3)
            RETURNING id, added_at, product_type, reception_id
            "#,
        )
        .bind(draft.id)
        .bind(draft.product_type.as_str())
        .bind(open.id)
        .fetch_one(&mut *tx)
        .await?;

        let product = parse_product(&row)?;
        commit(tx).await?;
        Ok(product)
    }

    async fn remove_last(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Product>, StoreError> {
        let mut tx = self.begin().await?;
        let open = lock_open_reception(&mut tx, pickup_point_id).await?;

        let row = sqlx::query(
            r#"
            DELETE FROM product
            WHERE id = (
                SELECT id FROM product
                WHERE reception_id = $1
                ORDER BY added_at DESC, id DESC
                LIMIT 1
            )
            RETURNING id, added_at, product_type, reception_id
            "#,
        )
        .bind(open.id)
        .fetch_optional(&mut *tx)
        .await?;

        let removed = row.as_ref().map(parse_product).transpose()?;
        commit(tx).await?;
        Ok(removed)
    }
}

// =============================================================================
// UserRepository
// =============================================================================

#[async_trait]
impl UserRepository for PgStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id)
        .bind(user.email.as_str())
        .bind(user.password_hash.as_str())
        .bind(user.role.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::duplicate("user", user.email.as_str()))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row =
            sqlx::query("SELECT id, email, password_hash, role FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(parse_user).transpose()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, email, password_hash, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(parse_user).transpose()
    }
}

impl Store for PgStore {
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
