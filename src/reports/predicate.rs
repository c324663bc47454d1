//! Report filter predicates
//!
//! A [`ReportFilter`] turns into a [`PredicateSet`]: one predicate per present
//! option plus the mandatory order/line join. The set is rendered against an
//! [`Aliases`] value, so the same predicates can appear in an outer query and
//! in nested subqueries without alias collisions. Filter values are always
//! bound as parameters.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::postgres::Postgres;
use sqlx::QueryBuilder;

use crate::database::projection::{project, EntityKind};
use crate::dates;
use crate::shard::Shard;

/// Optional report filters as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportFilter {
    /// Zero means "any salesperson"
    pub salesperson_code: Option<i32>,
    pub article_name: Option<String>,
    pub branch_name: Option<String>,
    pub partner_name: Option<String>,
    /// Inclusive lower bound on the order date
    #[serde(deserialize_with = "dates::deserialize_optional")]
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on the order date
    #[serde(deserialize_with = "dates::deserialize_optional")]
    pub end_date: Option<NaiveDate>,
}

impl ReportFilter {
    pub fn date_range(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
            ..Self::default()
        }
    }
}

/// One filtering condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    SalespersonCode(i32),
    ArticleName(String),
    BranchName(String),
    PartnerName(String),
    OrderDateFrom(NaiveDate),
    OrderDateTo(NaiveDate),
    /// Ties each sale line to its order; always present
    OrderLineJoin,
}

impl Predicate {
    /// Extra table this predicate needs in the FROM list
    fn joined_entity(&self) -> Option<EntityKind> {
        match self {
            Predicate::ArticleName(_) => Some(EntityKind::Article),
            Predicate::BranchName(_) => Some(EntityKind::Branch),
            Predicate::PartnerName(_) => Some(EntityKind::Partner),
            _ => None,
        }
    }
}

/// Table aliases a predicate set is rendered against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aliases {
    pub order: &'static str,
    pub line: &'static str,
    pub article: &'static str,
    pub branch: &'static str,
    pub partner: &'static str,
}

impl Aliases {
    /// Outer report query
    pub const OUTER: Aliases = Aliases {
        order: "v",
        line: "lv",
        article: "a",
        branch: "s",
        partner: "p",
    };

    /// Total-transactions subquery
    pub const TOTALS: Aliases = Aliases {
        order: "v2",
        line: "lv2",
        article: "a2",
        branch: "s2",
        partner: "p2",
    };

    /// Per-order transactions subquery
    pub const PER_ORDER: Aliases = Aliases {
        order: "v3",
        line: "lv3",
        article: "a3",
        branch: "s3",
        partner: "p3",
    };

    fn for_entity(&self, kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::SalesOrder => self.order,
            EntityKind::SaleLine => self.line,
            EntityKind::Article => self.article,
            EntityKind::Branch => self.branch,
            _ => self.partner,
        }
    }
}

/// Ordered predicates built from a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateSet {
    predicates: Vec<Predicate>,
}

/// Compose the predicates for `filter`
///
/// Absent options, blank names and a zero salesperson code contribute nothing.
pub fn build_predicate(filter: &ReportFilter) -> PredicateSet {
    let mut predicates = Vec::new();

    if let Some(code) = filter.salesperson_code.filter(|c| *c != 0) {
        predicates.push(Predicate::SalespersonCode(code));
    }
    if let Some(name) = present(&filter.article_name) {
        predicates.push(Predicate::ArticleName(name));
    }
    if let Some(name) = present(&filter.branch_name) {
        predicates.push(Predicate::BranchName(name));
    }
    if let Some(name) = present(&filter.partner_name) {
        predicates.push(Predicate::PartnerName(name));
    }
    if let Some(date) = filter.start_date {
        predicates.push(Predicate::OrderDateFrom(date));
    }
    if let Some(date) = filter.end_date {
        predicates.push(Predicate::OrderDateTo(date));
    }
    predicates.push(Predicate::OrderLineJoin);

    PredicateSet { predicates }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

impl PredicateSet {
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Push `"SalesOrders" v, "SaleLines" lv` plus every table a predicate joins
    pub fn push_from(&self, builder: &mut QueryBuilder<'_, Postgres>, shard: Shard, aliases: &Aliases) {
        builder.push(format!(
            "{} {}, {} {}",
            EntityKind::SalesOrder.table(shard),
            aliases.order,
            EntityKind::SaleLine.table(shard),
            aliases.line
        ));
        for predicate in &self.predicates {
            if let Some(kind) = predicate.joined_entity() {
                if renders_false(predicate, shard) {
                    continue;
                }
                builder.push(format!(", {} {}", kind.table(shard), aliases.for_entity(kind)));
            }
        }
    }

    /// Push ` WHERE c1 AND c2 ...`, binding every filter value
    pub fn push_where<'args>(
        &self,
        builder: &mut QueryBuilder<'args, Postgres>,
        shard: Shard,
        aliases: &Aliases,
    ) {
        builder.push(" WHERE ");
        for (index, predicate) in self.predicates.iter().enumerate() {
            if index > 0 {
                builder.push(" AND ");
            }
            push_condition(builder, predicate, shard, aliases);
        }
    }
}

/// A name filter on a shard that does not store that name can match nothing
fn renders_false(predicate: &Predicate, shard: Shard) -> bool {
    match predicate {
        Predicate::PartnerName(_) => !project(shard, EntityKind::Partner).contains("partner_name"),
        Predicate::ArticleName(_) => !project(shard, EntityKind::Article).contains("article_name"),
        Predicate::BranchName(_) => !project(shard, EntityKind::Branch).contains("branch_name"),
        _ => false,
    }
}

fn push_condition<'args>(
    builder: &mut QueryBuilder<'args, Postgres>,
    predicate: &Predicate,
    shard: Shard,
    a: &Aliases,
) {
    if renders_false(predicate, shard) {
        builder.push("FALSE");
        return;
    }
    match predicate {
        Predicate::SalespersonCode(code) => {
            builder.push(format!("{}.salesperson_code = ", a.order));
            builder.push_bind(*code);
        }
        Predicate::ArticleName(name) => {
            builder.push(format!(
                "{line}.article_code = {art}.article_code AND {art}.article_name = ",
                line = a.line,
                art = a.article
            ));
            builder.push_bind(name.clone());
        }
        Predicate::BranchName(name) => {
            builder.push(format!(
                "{order}.branch_id = {br}.branch_id AND {br}.branch_name = ",
                order = a.order,
                br = a.branch
            ));
            builder.push_bind(name.clone());
        }
        Predicate::PartnerName(name) => {
            builder.push(format!(
                "{order}.partner_code = {p}.partner_code AND {p}.partner_name = ",
                order = a.order,
                p = a.partner
            ));
            builder.push_bind(name.clone());
        }
        Predicate::OrderDateFrom(date) => {
            builder.push(format!("{}.order_date >= ", a.order));
            builder.push_bind(*date);
        }
        Predicate::OrderDateTo(date) => {
            builder.push(format!("{}.order_date <= ", a.order));
            builder.push_bind(*date);
        }
        Predicate::OrderLineJoin => {
            builder.push(format!("{}.order_id = {}.order_id", a.order, a.line));
        }
    }
}
