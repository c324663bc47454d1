//! Fixed analytical reports
//!
//! Read-only and idempotent. Columns a shard does not materialize read as
//! empty labels, matching how entity reads zero-fill absent columns.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sqlx::postgres::Postgres;
use sqlx::{QueryBuilder, Row};
use tracing::debug;

use crate::database::projection::{project, EntityKind};
use crate::database::registry::ShardHandle;
use crate::error::Result;
use crate::reports::predicate::{build_predicate, Aliases, ReportFilter};
use crate::shard::Shard;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSales {
    pub group_name: String,
    pub total_sales: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionQuantity {
    pub region: String,
    pub unit_name: String,
    pub average_quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterDiscount {
    /// `YYYY-qN`
    pub quarter: String,
    pub discount_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayVolume {
    /// Abbreviated day name, e.g. `MON`
    pub weekday: String,
    /// ISO day number, Monday = 1
    pub iso_day: i32,
    pub average_quantity: Decimal,
}

/// `alias.column`, or an empty literal if the shard lacks the column
fn column_or_empty(shard: Shard, kind: EntityKind, alias: &str, column: &str) -> String {
    if project(shard, kind).contains(column) {
        format!("COALESCE({}.{}, '')", alias, column)
    } else {
        "''".to_string()
    }
}

pub fn group_sales_sql(shard: Shard) -> String {
    format!(
        "SELECT {name} AS group_name, COALESCE(SUM(v.amount_paid), 0) AS total_sales \
         FROM {orders} v \
         JOIN {lines} lv ON v.order_id = lv.order_id \
         JOIN {articles} a ON lv.article_code = a.article_code \
         JOIN {groups} ga ON a.group_code = ga.group_code \
         GROUP BY 1 ORDER BY 1",
        name = column_or_empty(shard, EntityKind::ArticleGroup, "ga", "group_name"),
        orders = EntityKind::SalesOrder.table(shard),
        lines = EntityKind::SaleLine.table(shard),
        articles = EntityKind::Article.table(shard),
        groups = EntityKind::ArticleGroup.table(shard),
    )
}

/// Per-order summed quantity keyed by the branch's address id and unit
///
/// Branch addresses live in the global shard, so the region label is resolved
/// there afterwards; see [`address_regions_sql`].
pub fn order_quantities_sql(shard: Shard) -> String {
    format!(
        "SELECT s.address_id, {unit} AS unit_name, v.order_id, \
         SUM(lv.quantity) AS quantity \
         FROM {orders} v \
         JOIN {lines} lv ON v.order_id = lv.order_id \
         JOIN {branches} s ON v.branch_id = s.branch_id \
         JOIN {articles} ar ON lv.article_code = ar.article_code \
         JOIN {units} um ON ar.unit_id = um.unit_id \
         GROUP BY s.address_id, 2, v.order_id",
        unit = column_or_empty(shard, EntityKind::UnitOfMeasure, "um", "unit_name"),
        orders = EntityKind::SalesOrder.table(shard),
        lines = EntityKind::SaleLine.table(shard),
        branches = EntityKind::Branch.table(shard),
        articles = EntityKind::Article.table(shard),
        units = EntityKind::UnitOfMeasure.table(shard),
    )
}

/// Regions of the given global address ids
pub fn address_regions_sql() -> String {
    format!(
        "SELECT address_id, COALESCE(region, '') AS region FROM {} \
         WHERE address_id = ANY($1)",
        EntityKind::Address.table(Shard::Global)
    )
}

/// One order's summed quantity for one unit, at one branch address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuantity {
    pub address_id: i32,
    pub unit_name: String,
    pub quantity: Decimal,
}

/// Average per-order quantity for each (region, unit) cohort
///
/// Addresses without a known region fall into the `''` cohort. Averages are
/// rounded half away from zero to 4 places; rows are ordered by region, then
/// unit.
pub fn average_by_region(
    orders: &[OrderQuantity],
    regions: &HashMap<i32, String>,
) -> Vec<RegionQuantity> {
    let mut cohorts: BTreeMap<(String, String), (Decimal, u32)> = BTreeMap::new();
    for order in orders {
        let region = regions.get(&order.address_id).cloned().unwrap_or_default();
        let entry = cohorts
            .entry((region, order.unit_name.clone()))
            .or_insert((Decimal::ZERO, 0));
        entry.0 += order.quantity;
        entry.1 += 1;
    }

    cohorts
        .into_iter()
        .map(|((region, unit_name), (sum, count))| RegionQuantity {
            region,
            unit_name,
            average_quantity: (sum / Decimal::from(count))
                .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero),
        })
        .collect()
}

/// Quarter is `ceil(month / 3)`; a zero total counts as 1
pub fn quarter_discounts_sql(shard: Shard) -> String {
    format!(
        "SELECT EXTRACT(YEAR FROM v.order_date)::INTEGER || '-q' || \
         CEIL(EXTRACT(MONTH FROM v.order_date) / 3.0)::INTEGER AS quarter, \
         COALESCE(ROUND(AVG(v.discount * 100 / COALESCE(NULLIF(v.total, 0), 1)), 4), 0) \
         AS discount_percent \
         FROM {orders} v \
         WHERE v.order_date IS NOT NULL \
         GROUP BY 1 ORDER BY 1",
        orders = EntityKind::SalesOrder.table(shard),
    )
}

/// Per-order delivered quantity averaged by delivery weekday, Monday first
pub fn weekday_volumes_query<'args>(
    filter: &ReportFilter,
    shard: Shard,
) -> QueryBuilder<'args, Postgres> {
    let a = Aliases::OUTER;
    let predicates = build_predicate(&ReportFilter::date_range(filter.start_date, filter.end_date));

    let mut builder = QueryBuilder::new(format!(
        "SELECT TRIM(TO_CHAR(per_order.delivery_date, 'DY')) AS weekday, \
         EXTRACT(ISODOW FROM per_order.delivery_date)::INTEGER AS iso_day, \
         COALESCE(ROUND(AVG(per_order.quantity), 4), 0) AS average_quantity \
         FROM (SELECT {v}.order_id, {v}.delivery_date, SUM({lv}.quantity) AS quantity FROM ",
        v = a.order,
        lv = a.line
    ));
    predicates.push_from(&mut builder, shard, &a);
    predicates.push_where(&mut builder, shard, &a);
    builder.push(format!(
        " AND {v}.delivery_date IS NOT NULL GROUP BY {v}.order_id, {v}.delivery_date) per_order \
         GROUP BY EXTRACT(ISODOW FROM per_order.delivery_date), \
         TO_CHAR(per_order.delivery_date, 'DY') \
         ORDER BY EXTRACT(ISODOW FROM per_order.delivery_date)",
        v = a.order
    ));
    builder
}

pub async fn group_sales(handle: &ShardHandle) -> Result<Vec<GroupSales>> {
    let sql = group_sales_sql(handle.shard());
    debug!(shard = %handle.shard(), "{}", sql);
    let rows = sqlx::query(&sql)
        .fetch_all(handle.pool())
        .await
        .map_err(|e| handle.error(e))?;

    rows.iter()
        .map(|row| {
            Ok(GroupSales {
                group_name: row.try_get("group_name")?,
                total_sales: row.try_get("total_sales")?,
            })
        })
        .collect()
}

/// `global` resolves the region of each branch address
pub async fn region_quantities(
    handle: &ShardHandle,
    global: &ShardHandle,
) -> Result<Vec<RegionQuantity>> {
    let sql = order_quantities_sql(handle.shard());
    debug!(shard = %handle.shard(), "{}", sql);
    let rows = sqlx::query(&sql)
        .fetch_all(handle.pool())
        .await
        .map_err(|e| handle.error(e))?;

    let orders = rows
        .iter()
        .map(|row| {
            Ok(OrderQuantity {
                address_id: row.try_get("address_id")?,
                unit_name: row.try_get("unit_name")?,
                quantity: row
                    .try_get::<Option<Decimal>, _>("quantity")?
                    .unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<i32> = orders.iter().map(|o| o.address_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let sql = address_regions_sql();
    debug!(shard = %global.shard(), "{}", sql);
    let rows = sqlx::query(&sql)
        .bind(&ids)
        .fetch_all(global.pool())
        .await
        .map_err(|e| global.error(e))?;
    let regions = rows
        .iter()
        .map(|row| Ok((row.try_get("address_id")?, row.try_get("region")?)))
        .collect::<Result<HashMap<i32, String>>>()?;

    Ok(average_by_region(&orders, &regions))
}

pub async fn quarter_discounts(handle: &ShardHandle) -> Result<Vec<QuarterDiscount>> {
    let sql = quarter_discounts_sql(handle.shard());
    debug!(shard = %handle.shard(), "{}", sql);
    let rows = sqlx::query(&sql)
        .fetch_all(handle.pool())
        .await
        .map_err(|e| handle.error(e))?;

    rows.iter()
        .map(|row| {
            Ok(QuarterDiscount {
                quarter: row.try_get("quarter")?,
                discount_percent: row.try_get("discount_percent")?,
            })
        })
        .collect()
}

pub async fn weekday_volumes(
    handle: &ShardHandle,
    filter: &ReportFilter,
) -> Result<Vec<WeekdayVolume>> {
    let mut builder = weekday_volumes_query(filter, handle.shard());
    debug!(shard = %handle.shard(), "{}", builder.sql());
    let rows = builder
        .build()
        .fetch_all(handle.pool())
        .await
        .map_err(|e| handle.error(e))?;

    rows.iter()
        .map(|row| {
            Ok(WeekdayVolume {
                weekday: row.try_get("weekday")?,
                iso_day: row.try_get("iso_day")?,
                average_quantity: row.try_get("average_quantity")?,
            })
        })
        .collect()
}
