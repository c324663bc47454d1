//! Form reports composed from a [`PredicateSet`]

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{QueryBuilder, Row};
use tracing::debug;

use crate::database::registry::ShardHandle;
use crate::error::Result;
use crate::reports::predicate::{build_predicate, Aliases, PredicateSet, ReportFilter};
use crate::shard::Shard;

/// One line of a form report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub price: Decimal,
    pub quantity: Decimal,
    pub vat: Decimal,
    pub discount: Decimal,
    pub amount_paid: Decimal,
    pub transactions: Decimal,
}

impl ReportRow {
    fn from_row(row: &PgRow, prefix: &str) -> Result<Self> {
        let get = |name: &str| -> Result<Decimal> {
            let column = format!("{}{}", prefix, name);
            Ok(row
                .try_get::<Option<Decimal>, _>(column.as_str())?
                .unwrap_or_default())
        };
        Ok(Self {
            price: get("price")?,
            quantity: get("quantity")?,
            vat: get("vat")?,
            discount: get("discount")?,
            amount_paid: get("amount_paid")?,
            transactions: get("transactions")?,
        })
    }
}

/// Flat report: one row per matching order
pub fn flat_report_query<'args>(
    predicates: &PredicateSet,
    shard: Shard,
) -> QueryBuilder<'args, Postgres> {
    let a = Aliases::OUTER;
    let mut builder = QueryBuilder::new(format!(
        "SELECT SUM({lv}.price) AS price, SUM({lv}.quantity) AS quantity, {v}.vat AS vat, \
         SUM({lv}.discount) AS discount, {v}.amount_paid AS amount_paid, \
         COUNT(*)::NUMERIC AS transactions FROM ",
        v = a.order,
        lv = a.line
    ));
    predicates.push_from(&mut builder, shard, &a);
    predicates.push_where(&mut builder, shard, &a);
    builder.push(format!(
        " GROUP BY {v}.vat, {v}.amount_paid, {v}.order_id ORDER BY {v}.order_id",
        v = a.order
    ));
    builder
}

/// Grouped report: a single row carrying both totals and averages
///
/// The predicates are rendered three times with disjoint alias sets: the
/// outer query, the total-transactions subquery and the per-order
/// transactions subquery.
pub fn grouped_report_query<'args>(
    predicates: &PredicateSet,
    shard: Shard,
) -> QueryBuilder<'args, Postgres> {
    let outer = Aliases::OUTER;
    let totals = Aliases::TOTALS;
    let per_order = Aliases::PER_ORDER;

    let mut builder = QueryBuilder::new(format!(
        "SELECT COALESCE(SUM({lv}.price), 0) AS total_price, \
         COALESCE(SUM({lv}.quantity), 0) AS total_quantity, \
         COALESCE(SUM({v}.vat), 0) AS total_vat, \
         COALESCE(SUM({lv}.discount), 0) AS total_discount, \
         COALESCE(SUM({v}.amount_paid), 0) AS total_amount_paid, \
         (SELECT COUNT(*) FROM ",
        v = outer.order,
        lv = outer.line
    ));
    predicates.push_from(&mut builder, shard, &totals);
    predicates.push_where(&mut builder, shard, &totals);

    builder.push(format!(
        ")::NUMERIC AS total_transactions, \
         COALESCE(ROUND(AVG({lv}.price), 4), 0) AS avg_price, \
         COALESCE(ROUND(AVG({lv}.quantity), 4), 0) AS avg_quantity, \
         COALESCE(ROUND(AVG({v}.vat), 4), 0) AS avg_vat, \
         COALESCE(ROUND(AVG({lv}.discount), 4), 0) AS avg_discount, \
         COALESCE(ROUND(AVG({v}.amount_paid), 4), 0) AS avg_amount_paid, \
         COALESCE((SELECT ROUND(AVG(per_order.lines), 4) FROM (SELECT COUNT(*) AS lines FROM ",
        v = outer.order,
        lv = outer.line
    ));
    predicates.push_from(&mut builder, shard, &per_order);
    predicates.push_where(&mut builder, shard, &per_order);
    builder.push(format!(
        " GROUP BY {}.order_id) per_order), 0) AS avg_transactions FROM ",
        per_order.order
    ));

    predicates.push_from(&mut builder, shard, &outer);
    predicates.push_where(&mut builder, shard, &outer);
    builder
}

/// Rows of the flat form report
pub async fn form_report(handle: &ShardHandle, filter: &ReportFilter) -> Result<Vec<ReportRow>> {
    let predicates = build_predicate(filter);
    let mut builder = flat_report_query(&predicates, handle.shard());
    debug!(shard = %handle.shard(), "{}", builder.sql());

    let rows = builder
        .build()
        .fetch_all(handle.pool())
        .await
        .map_err(|e| handle.error(e))?;
    rows.iter().map(|row| ReportRow::from_row(row, "")).collect()
}

/// Two rows: sums first, then averages
pub async fn grouped_form_report(
    handle: &ShardHandle,
    filter: &ReportFilter,
) -> Result<Vec<ReportRow>> {
    let predicates = build_predicate(filter);
    let mut builder = grouped_report_query(&predicates, handle.shard());
    debug!(shard = %handle.shard(), "{}", builder.sql());

    let row = builder
        .build()
        .fetch_one(handle.pool())
        .await
        .map_err(|e| handle.error(e))?;
    Ok(vec![
        ReportRow::from_row(&row, "total_")?,
        ReportRow::from_row(&row, "avg_")?,
    ])
}
