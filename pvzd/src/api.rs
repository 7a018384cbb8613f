//! HTTP API for the PVZ daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - Accounts (dummy login, register, login)
//! - Pickup points (create, list, list all, last reception status)
//! - Receptions (open, close)
//! - Products (append, remove last)
//!
//! The Prometheus scrape endpoint is served by a separate router on the
//! metrics port.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        MatchedPath, Path, Query, Request, State,
    },
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;

use pvz_domain::{
    City, Operation, PickupPoint, PickupPointView, Product, ProductType, Reception,
    ReceptionStatus, ReceptionView, User, UserRole,
};

use crate::accounts::AccountService;
use crate::error::{ErrorKind, PvzError};
use crate::metrics::Metrics;
use crate::product_ledger::ProductLedger;
use crate::reception_engine::ReceptionEngine;
use crate::registry::{ListPickupPoints, PickupPointRegistry};

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct AppState {
    pub engine: ReceptionEngine,
    pub ledger: ProductLedger,
    pub registry: PickupPointRegistry,
    pub accounts: AccountService,
    pub metrics: Arc<Metrics>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct DummyLoginRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request to register a pickup point.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePvzRequest {
    pub id: Option<Uuid>,
    pub registration_date: Option<DateTime<Utc>>,
    pub city: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenReceptionRequest {
    pub pvz_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendProductRequest {
    #[serde(rename = "type")]
    pub product_type: String,
    pub pvz_id: Uuid,
}

/// Listing query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPvzParams {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvzDto {
    pub id: Uuid,
    pub registration_date: DateTime<Utc>,
    pub city: City,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceptionDto {
    pub id: Uuid,
    pub date_time: DateTime<Utc>,
    pub pvz_id: Uuid,
    pub status: ReceptionStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: Uuid,
    pub date_time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub reception_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceptionWithProducts {
    pub reception: ReceptionDto,
    pub products: Vec<ProductDto>,
}

/// One entry of the composite listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct PvzWithReceptions {
    pub pvz: PvzDto,
    pub receptions: Vec<ReceptionWithProducts>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: ReceptionStatus,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.to_string(),
            role: user.role,
        }
    }
}

impl From<PickupPoint> for PvzDto {
    fn from(point: PickupPoint) -> Self {
        Self {
            id: point.id,
            registration_date: point.registration_date,
            city: point.city,
        }
    }
}

impl From<Reception> for ReceptionDto {
    fn from(reception: Reception) -> Self {
        Self {
            id: reception.id,
            date_time: reception.started_at,
            pvz_id: reception.pickup_point_id,
            status: reception.status,
        }
    }
}

impl From<Product> for ProductDto {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            date_time: product.added_at,
            product_type: product.product_type,
            reception_id: product.reception_id,
        }
    }
}

impl From<ReceptionView> for ReceptionWithProducts {
    fn from(view: ReceptionView) -> Self {
        Self {
            reception: view.reception.into(),
            products: view.products.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<PickupPointView> for PvzWithReceptions {
    fn from(view: PickupPointView) -> Self {
        Self {
            pvz: view.point.into(),
            receptions: view.receptions.into_iter().map(Into::into).collect(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/dummyLogin", post(dummy_login_handler))
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/pvz", post(create_pvz_handler).get(list_pvz_handler))
        .route("/pvz/all", get(list_all_pvz_handler))
        .route("/pvz/:id/status", get(status_handler))
        .route("/pvz/:id/close_last_reception", post(close_reception_handler))
        .route("/pvz/:id/delete_last_product", post(delete_last_product_handler))
        .route("/receptions", post(open_reception_handler))
        .route("/products", post(append_product_handler))
        .route("/health", get(health_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the router serving `/metrics`.
pub fn create_metrics_router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

// =============================================================================
// Middleware
// =============================================================================

/// Record request count and latency per matched route.
async fn track_metrics(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let response = next.run(req).await;

    state.metrics.observe_request(
        &method,
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => to_error_response(e).into_response(),
    }
}

async fn dummy_login_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DummyLoginRequest>, JsonRejection>,
) -> ApiResult<Json<String>> {
    let Json(req) = body.map_err(json_rejection)?;

    let token = state
        .accounts
        .dummy_login(&req.role)
        .await
        .map_err(to_error_response)?;

    Ok(Json(token))
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserDto>)> {
    let Json(req) = body.map_err(json_rejection)?;

    let (user, _token) = state
        .accounts
        .register(&req.email, &req.password, &req.role)
        .await
        .map_err(to_error_response)?;

    Ok((StatusCode::CREATED, Json(UserDto::from(&user))))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<String>> {
    let Json(req) = body.map_err(json_rejection)?;

    let token = state
        .accounts
        .login(&req.email, &req.password)
        .await
        .map_err(to_error_response)?;

    Ok(Json(token))
}

/// Register a pickup point.
async fn create_pvz_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreatePvzRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PvzDto>)> {
    authorize(&state, &headers, Operation::CreatePickupPoint).await?;
    let Json(req) = body.map_err(json_rejection)?;

    let point = state
        .registry
        .create_pickup_point(req.id, req.registration_date, &req.city)
        .await
        .map_err(to_error_response)?;

    Ok((StatusCode::CREATED, Json(point.into())))
}

/// Composite listing with receptions and products.
async fn list_pvz_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Result<Query<ListPvzParams>, QueryRejection>,
) -> ApiResult<Json<Vec<PvzWithReceptions>>> {
    authorize(&state, &headers, Operation::ListPickupPoints).await?;
    let Query(params) = params.map_err(|e| invalid_request(e.body_text()))?;

    let views = state
        .registry
        .list_pickup_points(ListPickupPoints {
            limit: params.limit,
            page: params.page,
            start: params.start_date,
            end: params.end_date,
        })
        .await
        .map_err(to_error_response)?;

    Ok(Json(views.into_iter().map(Into::into).collect()))
}

async fn list_all_pvz_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<PvzDto>>> {
    authorize(&state, &headers, Operation::ListAllPickupPoints).await?;

    let points = state
        .registry
        .list_all_pickup_points()
        .await
        .map_err(to_error_response)?;

    Ok(Json(points.into_iter().map(Into::into).collect()))
}

async fn status_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<StatusResponse>> {
    authorize(&state, &headers, Operation::GetLastReceptionStatus).await?;
    let Path(id) = id.map_err(path_rejection)?;

    let status = state
        .engine
        .last_reception_status(id)
        .await
        .map_err(to_error_response)?;

    Ok(Json(StatusResponse { status }))
}

/// Open a reception.
async fn open_reception_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<OpenReceptionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ReceptionDto>)> {
    authorize(&state, &headers, Operation::OpenReception).await?;
    let Json(req) = body.map_err(json_rejection)?;

    let reception = state
        .engine
        .open_reception(req.pvz_id)
        .await
        .map_err(to_error_response)?;

    Ok((StatusCode::CREATED, Json(reception.into())))
}

async fn close_reception_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ReceptionDto>> {
    authorize(&state, &headers, Operation::CloseReception).await?;
    let Path(id) = id.map_err(path_rejection)?;

    let reception = state
        .engine
        .close_reception(id)
        .await
        .map_err(to_error_response)?;

    Ok(Json(reception.into()))
}

/// Add a product to the open reception.
async fn append_product_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<AppendProductRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProductDto>)> {
    authorize(&state, &headers, Operation::AppendProduct).await?;
    let Json(req) = body.map_err(json_rejection)?;

    let product = state
        .ledger
        .append_product(req.pvz_id, &req.product_type)
        .await
        .map_err(to_error_response)?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

async fn delete_last_product_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    authorize(&state, &headers, Operation::RemoveLastProduct).await?;
    let Path(id) = id.map_err(path_rejection)?;

    state
        .ledger
        .remove_last_product(id)
        .await
        .map_err(to_error_response)?;

    Ok(Json(serde_json::json!({})))
}

// =============================================================================
// Helpers
// =============================================================================

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn authorize(state: &AppState, headers: &HeaderMap, operation: Operation) -> ApiResult<()> {
    state
        .accounts
        .authorize(bearer_token(headers), operation)
        .await
        .map(|_| ())
        .map_err(to_error_response)
}

fn invalid_request(message: String) -> ApiError {
    to_error_response(PvzError::InvalidRequest(message))
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    invalid_request(format!("invalid request body: {}", rejection.body_text()))
}

fn path_rejection(_: PathRejection) -> ApiError {
    invalid_request("invalid UUID format".to_string())
}

fn to_error_response(error: PvzError) -> ApiError {
    let status = match &error {
        PvzError::Unauthorized(_) | PvzError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        PvzError::Forbidden { .. } => StatusCode::FORBIDDEN,
        _ if error.kind() == ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %error, "Request failed");
        "internal server error".to_string()
    } else {
        if status != StatusCode::BAD_REQUEST {
            warn!(error = %error, "Request rejected");
        }
        error.to_string()
    };

    (status, Json(ErrorResponse { message }))
}

// =============================================================================
// Tests
// =============================================================================
