//! Route handlers
//!
//! Every route accepts `?shard=` (default `global`). Partners are always
//! written to the global shard.

use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::api::error::AppError;
use crate::database::coordinator::GeneratedKeys;
use crate::model::{
    Address, Article, ArticleGroup, Branch, NewBranch, NewPartner, NewSalesOrder, NewSalesperson,
    Partner, Project, SaleLine, SalesOrder, Salesperson, UnitOfMeasure,
};
use crate::reports::{
    GroupSales, QuarterDiscount, RegionQuantity, ReportFilter, ReportRow, WeekdayVolume,
};
use crate::service::SalesPort;
use crate::shard::Shard;

type Port = Extension<Arc<dyn SalesPort>>;
type Created = (StatusCode, Json<GeneratedKeys>);

#[derive(Debug, Default, Deserialize)]
pub struct ShardQuery {
    pub shard: Option<String>,
}

impl ShardQuery {
    fn shard(&self) -> Shard {
        Shard::select(self.shard.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub order_id: i32,
}

fn created(keys: GeneratedKeys) -> Created {
    (StatusCode::CREATED, Json(keys))
}

/// Pings the global shard
pub async fn health(Extension(port): Port) -> Result<&'static str, AppError> {
    port.ping(Shard::Global).await?;
    Ok("OK")
}

// ============================================================================
// Collections and inserts
// ============================================================================

pub async fn list_partners(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<Partner>>, AppError> {
    Ok(Json(port.partners(q.shard()).await?))
}

pub async fn create_partner(
    Extension(port): Port,
    Json(payload): Json<NewPartner>,
) -> Result<Created, AppError> {
    Ok(created(port.insert_partner(Shard::Global, payload).await?))
}

pub async fn list_addresses(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<Address>>, AppError> {
    Ok(Json(port.addresses(q.shard()).await?))
}

pub async fn list_articles(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<Article>>, AppError> {
    Ok(Json(port.articles(q.shard()).await?))
}

pub async fn create_article(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Json(article): Json<Article>,
) -> Result<Created, AppError> {
    Ok(created(port.insert_article(q.shard(), article).await?))
}

pub async fn list_salespeople(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<Salesperson>>, AppError> {
    Ok(Json(port.salespeople(q.shard()).await?))
}

pub async fn create_salesperson(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Json(payload): Json<NewSalesperson>,
) -> Result<Created, AppError> {
    Ok(created(port.insert_salesperson(q.shard(), payload).await?))
}

pub async fn list_sales(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<SalesOrder>>, AppError> {
    Ok(Json(port.sales_orders(q.shard()).await?))
}

pub async fn create_sale(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Json(payload): Json<NewSalesOrder>,
) -> Result<Created, AppError> {
    Ok(created(port.insert_sales_order(q.shard(), payload).await?))
}

pub async fn list_sale_lines(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Query(order): Query<OrderQuery>,
) -> Result<Json<Vec<SaleLine>>, AppError> {
    Ok(Json(port.sale_lines(q.shard(), order.order_id).await?))
}

pub async fn create_sale_line(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Json(line): Json<SaleLine>,
) -> Result<Created, AppError> {
    Ok(created(port.insert_sale_line(q.shard(), line).await?))
}

pub async fn update_sale_line(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Path((order_id, line_number)): Path<(i32, i32)>,
    Json(line): Json<SaleLine>,
) -> Result<StatusCode, AppError> {
    port.update_sale_line(q.shard(), order_id, line_number, line)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_sale_line(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Path((order_id, line_number)): Path<(i32, i32)>,
) -> Result<StatusCode, AppError> {
    port.delete_sale_line(q.shard(), order_id, line_number)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_branches(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<Branch>>, AppError> {
    Ok(Json(port.branches(q.shard()).await?))
}

pub async fn create_branch(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Json(payload): Json<NewBranch>,
) -> Result<Created, AppError> {
    Ok(created(port.insert_branch(q.shard(), payload).await?))
}

pub async fn list_projects(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(port.projects(q.shard()).await?))
}

pub async fn create_project(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Json(project): Json<Project>,
) -> Result<Created, AppError> {
    Ok(created(port.insert_project(q.shard(), project).await?))
}

pub async fn list_article_groups(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<ArticleGroup>>, AppError> {
    Ok(Json(port.article_groups(q.shard()).await?))
}

pub async fn list_units(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<UnitOfMeasure>>, AppError> {
    Ok(Json(port.units(q.shard()).await?))
}

// ============================================================================
// Reports
// ============================================================================

pub async fn form_report(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<Vec<ReportRow>>, AppError> {
    Ok(Json(port.form_report(q.shard(), filter).await?))
}

pub async fn grouped_form_report(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<Vec<ReportRow>>, AppError> {
    Ok(Json(port.grouped_form_report(q.shard(), filter).await?))
}

pub async fn group_sales(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<GroupSales>>, AppError> {
    Ok(Json(port.group_sales(q.shard()).await?))
}

pub async fn region_quantities(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<RegionQuantity>>, AppError> {
    Ok(Json(port.region_quantities(q.shard()).await?))
}

pub async fn quarter_discounts(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
) -> Result<Json<Vec<QuarterDiscount>>, AppError> {
    Ok(Json(port.quarter_discounts(q.shard()).await?))
}

pub async fn weekday_volumes(
    Extension(port): Port,
    Query(q): Query<ShardQuery>,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<Vec<WeekdayVolume>>, AppError> {
    Ok(Json(port.weekday_volumes(q.shard(), filter).await?))
}
