//! Retail products and stock, and the suppliers they come from.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use tracing::instrument;

use salonhub_core::pagination::{Page, PageRequest};
use salonhub_core::{Capability, ProductId, SupplierId};

use crate::db::{ProductRepository, SupplierRepository};
use crate::error::AppError;
use crate::middleware::RequireStaff;
use crate::models::{
    Product, ProductFilter, ProductInput, StockAdjustment, Supplier, SupplierInput, non_blank,
};
use crate::routes::ActiveToggle;
use crate::state::AppState;

/// Build the inventory router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/{id}", get(show_product).put(update_product))
        .route("/api/products/{id}/stock", post(adjust_stock))
        .route("/api/products/{id}/active", post(set_product_active))
        .route("/api/suppliers", get(list_suppliers).post(create_supplier))
        .route(
            "/api/suppliers/{id}",
            get(show_supplier)
                .put(update_supplier)
                .delete(delete_supplier),
        )
}

async fn load_product(state: &AppState, id: ProductId) -> Result<Product, AppError> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Products are stocked per branch. Staff see their own branch.
///
/// GET /api/products
async fn list_products(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Product>>, AppError> {
    filter.branch_id = user.scope_branch(filter.branch_id)?;
    let products = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(products))
}

/// GET /api/products/{id}
async fn show_product(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    let product = load_product(&state, id).await?;
    user.ensure_branch(product.branch_id)?;
    Ok(Json(product))
}

/// POST /api/products
#[instrument(skip(state, user, body), fields(user_id = %user.id, branch_id = %body.branch_id))]
async fn create_product(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    user.require(Capability::ManageProducts)?;
    user.ensure_branch(body.branch_id)?;
    body.validate().map_err(AppError::Unprocessable)?;

    let product = ProductRepository::new(state.pool()).create(&body).await?;
    tracing::info!(product_id = %product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Replace a product's details. Stock is set here only on correction;
/// day-to-day changes go through `/stock`.
///
/// PUT /api/products/{id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update_product(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductInput>,
) -> Result<Json<Product>, AppError> {
    user.require(Capability::ManageProducts)?;
    let existing = load_product(&state, id).await?;
    user.ensure_branch(existing.branch_id)?;
    user.ensure_branch(body.branch_id)?;
    body.validate().map_err(AppError::Unprocessable)?;

    let product = ProductRepository::new(state.pool())
        .update(id, &body)
        .await?;
    tracing::info!(product_id = %id, "Product updated");
    Ok(Json(product))
}

/// Receive or write off stock.
///
/// POST /api/products/{id}/stock
#[instrument(skip(state, user, body), fields(user_id = %user.id, delta = body.delta))]
async fn adjust_stock(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<StockAdjustment>,
) -> Result<Json<Product>, AppError> {
    user.require(Capability::ManageProducts)?;
    if body.delta == 0 {
        return Err(AppError::Unprocessable(
            "stock adjustment cannot be zero".to_string(),
        ));
    }
    let existing = load_product(&state, id).await?;
    user.ensure_branch(existing.branch_id)?;

    let product = ProductRepository::new(state.pool())
        .adjust_stock(id, body.delta)
        .await?;
    tracing::info!(
        product_id = %id,
        stock = product.stock,
        reason = non_blank(body.reason.as_deref()).as_deref().unwrap_or("-"),
        "Stock adjusted"
    );
    if product.is_low_stock() {
        tracing::warn!(product_id = %id, stock = product.stock, "Product at reorder level");
    }
    Ok(Json(product))
}

/// POST /api/products/{id}/active
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn set_product_active(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<ActiveToggle>,
) -> Result<Json<Product>, AppError> {
    user.require(Capability::ManageProducts)?;
    let existing = load_product(&state, id).await?;
    user.ensure_branch(existing.branch_id)?;

    ProductRepository::new(state.pool())
        .set_active(id, body.active)
        .await?;
    tracing::info!(product_id = %id, active = body.active, "Product status changed");
    Ok(Json(load_product(&state, id).await?))
}

/// Suppliers are shared by all branches. Anyone stocking products can
/// read them.
///
/// GET /api/suppliers
async fn list_suppliers(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<Vec<Supplier>>, AppError> {
    user.require(Capability::ManageProducts)?;
    Ok(Json(SupplierRepository::new(state.pool()).list().await?))
}

/// GET /api/suppliers/{id}
async fn show_supplier(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<SupplierId>,
) -> Result<Json<Supplier>, AppError> {
    user.require(Capability::ManageProducts)?;
    let supplier = SupplierRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("supplier {id}")))?;
    Ok(Json(supplier))
}

/// POST /api/suppliers
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn create_supplier(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<SupplierInput>,
) -> Result<(StatusCode, Json<Supplier>), AppError> {
    user.require(Capability::ManageSuppliers)?;
    body.validate().map_err(AppError::Unprocessable)?;

    let supplier = SupplierRepository::new(state.pool()).create(&body).await?;
    tracing::info!(supplier_id = %supplier.id, name = %supplier.name, "Supplier created");
    Ok((StatusCode::CREATED, Json(supplier)))
}

/// PUT /api/suppliers/{id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update_supplier(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<SupplierId>,
    Json(body): Json<SupplierInput>,
) -> Result<Json<Supplier>, AppError> {
    user.require(Capability::ManageSuppliers)?;
    body.validate().map_err(AppError::Unprocessable)?;

    let supplier = SupplierRepository::new(state.pool())
        .update(id, &body)
        .await?;
    tracing::info!(supplier_id = %id, "Supplier updated");
    Ok(Json(supplier))
}

/// Delete a supplier no product references.
///
/// DELETE /api/suppliers/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn delete_supplier(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<SupplierId>,
) -> Result<StatusCode, AppError> {
    user.require(Capability::ManageSuppliers)?;
    SupplierRepository::new(state.pool()).delete(id).await?;
    tracing::info!(supplier_id = %id, "Supplier deleted");
    Ok(StatusCode::NO_CONTENT)
}
