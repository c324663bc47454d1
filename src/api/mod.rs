//! HTTP surface over [`SalesPort`]

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, put},
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::service::SalesPort;

pub use error::AppError;

/// Build the full router. Every route takes an optional `?shard=` selector.
pub fn build_router(port: Arc<dyn SalesPort>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/partners",
            get(handlers::list_partners).post(handlers::create_partner),
        )
        .route("/addresses", get(handlers::list_addresses))
        .route(
            "/articles",
            get(handlers::list_articles).post(handlers::create_article),
        )
        .route(
            "/salespeople",
            get(handlers::list_salespeople).post(handlers::create_salesperson),
        )
        .route("/sales", get(handlers::list_sales).post(handlers::create_sale))
        .route(
            "/sale-lines",
            get(handlers::list_sale_lines).post(handlers::create_sale_line),
        )
        .route(
            "/sale-lines/:order_id/:line_number",
            put(handlers::update_sale_line).delete(handlers::delete_sale_line),
        )
        .route(
            "/branches",
            get(handlers::list_branches).post(handlers::create_branch),
        )
        .route(
            "/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route("/article-groups", get(handlers::list_article_groups))
        .route("/units", get(handlers::list_units))
        .route("/reports/form", get(handlers::form_report))
        .route("/reports/form/grouped", get(handlers::grouped_form_report))
        .route("/reports/group-sales", get(handlers::group_sales))
        .route("/reports/region-quantities", get(handlers::region_quantities))
        .route("/reports/quarter-discounts", get(handlers::quarter_discounts))
        .route("/reports/weekday-volumes", get(handlers::weekday_volumes))
        .layer(Extension(port))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
