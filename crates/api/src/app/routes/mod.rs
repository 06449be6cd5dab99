use axum::{Router, routing::get};

pub mod accounting;
pub mod admin;
pub mod auth;
pub mod customers;
pub mod inventory;
pub mod materials;
pub mod purchases;
pub mod sales;
pub mod suppliers;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/materials", materials::router())
        .nest("/suppliers", suppliers::router())
        .nest("/customers", customers::router())
        .nest("/inventory", inventory::router())
        .nest("/purchases", purchases::router())
        .nest("/sales", sales::router())
        .nest("/accounting", accounting::router())
        .nest("/admin", admin::router())
        // Thin JSON lookups consumed by client-side form logic.
        .route("/api/materials/:code", get(materials::material_info))
        .route("/api/inventory/stock", get(inventory::stock_info))
        .route("/api/accounting/accounts", get(accounting::accounts_lookup))
}
