//! Entity projection resolver
//!
//! Each shard materializes a subset of every logical entity's columns. This
//! module holds the single table describing those subsets and the machinery
//! to turn a partial row back into a canonical record:
//!
//! - [`project`] answers "which columns does this shard have for this entity"
//! - [`PartialRow::decode`] scans exactly the selected columns out of a row
//! - [`Canonical::from_partial`] / [`reconstruct`] zero-fill everything else
//!
//! Zero values on a local-shard read mean "not present here", not a real zero.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::error::{DataAccessError, Result};
use crate::model::{
    Address, Article, ArticleGroup, Branch, Partner, Project, SaleLine, SalesOrder, Salesperson,
    UnitOfMeasure,
};
use crate::shard::Shard;

// ============================================================================
// Canonical column sets
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Int,
    Numeric,
    Date,
    Bool,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Int => "INTEGER",
            ColumnType::Numeric => "NUMERIC(14, 2)",
            ColumnType::Date => "DATE",
            ColumnType::Bool => "BOOLEAN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    /// SQL literal substituted for NULL in the select list
    pub null_default: Option<&'static str>,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        ty,
        null_default: None,
    }
}

const fn col_or(name: &'static str, ty: ColumnType, null_default: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        ty,
        null_default: Some(null_default),
    }
}

use ColumnType::{Bool, Date, Int, Numeric, Text};

const PARTNER: &[ColumnDef] = &[
    col("partner_code", Text),
    col("partner_name", Text),
    col("tax_id", Text),
    col("email", Text),
    col("address_id", Int),
];

const ADDRESS: &[ColumnDef] = &[
    col("address_id", Int),
    col("address_name", Text),
    col("city", Text),
    col("region", Text),
    col("sector", Text),
    col("street", Text),
    col("street_number", Text),
    col("block", Text),
    col("floor", Int),
];

const SALES_ORDER: &[ColumnDef] = &[
    col("order_id", Int),
    col("partner_code", Text),
    col("status", Text),
    col("order_date", Date),
    col("delivery_date", Date),
    col("total", Numeric),
    col("vat", Numeric),
    col("discount", Numeric),
    col("currency", Text),
    col("amount_paid", Numeric),
    col_or("notes", Text, "'N/A'"),
    col("salesperson_code", Int),
    col("branch_id", Int),
];

const SALE_LINE: &[ColumnDef] = &[
    col("order_id", Int),
    col("line_number", Int),
    col("article_code", Text),
    col("quantity", Numeric),
    col("price", Numeric),
    col("discount", Numeric),
    col("vat", Numeric),
    col("line_total", Numeric),
    col("project_code", Text),
];

const ARTICLE: &[ColumnDef] = &[
    col("article_code", Text),
    col("article_name", Text),
    col("group_code", Int),
    col("stock_quantity", Int),
    col("unit_id", Int),
];

const SALESPERSON: &[ColumnDef] = &[
    col("salesperson_code", Int),
    col("last_name", Text),
    col("first_name", Text),
    col("base_salary", Numeric),
    col("commission", Numeric),
    col("email", Text),
    col("address_id", Int),
];

const BRANCH: &[ColumnDef] = &[
    col("branch_id", Int),
    col("branch_name", Text),
    col("address_id", Int),
];

const PROJECT: &[ColumnDef] = &[
    col("project_code", Text),
    col("project_name", Text),
    col("valid_from", Date),
    col("valid_to", Date),
    col("active", Bool),
];

const ARTICLE_GROUP: &[ColumnDef] = &[
    col("group_code", Int),
    col("group_name", Text),
    col_or("group_details", Text, "''"),
];

const UNIT_OF_MEASURE: &[ColumnDef] = &[
    col("unit_id", Int),
    col("unit_name", Text),
    col("height", Numeric),
    col("width", Numeric),
    col("length", Numeric),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Partner,
    Address,
    SalesOrder,
    SaleLine,
    Article,
    Salesperson,
    Branch,
    Project,
    ArticleGroup,
    UnitOfMeasure,
}

impl EntityKind {
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Partner,
        EntityKind::Address,
        EntityKind::SalesOrder,
        EntityKind::SaleLine,
        EntityKind::Article,
        EntityKind::Salesperson,
        EntityKind::Branch,
        EntityKind::Project,
        EntityKind::ArticleGroup,
        EntityKind::UnitOfMeasure,
    ];

    pub fn base_table(self) -> &'static str {
        match self {
            EntityKind::Partner => "Partners",
            EntityKind::Address => "Addresses",
            EntityKind::SalesOrder => "SalesOrders",
            EntityKind::SaleLine => "SaleLines",
            EntityKind::Article => "Articles",
            EntityKind::Salesperson => "Salespeople",
            EntityKind::Branch => "Branches",
            EntityKind::Project => "Projects",
            EntityKind::ArticleGroup => "ArticleGroups",
            EntityKind::UnitOfMeasure => "UnitsOfMeasure",
        }
    }

    /// Human label used in logs and `NotFound` errors
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Partner => "partner",
            EntityKind::Address => "address",
            EntityKind::SalesOrder => "sales order",
            EntityKind::SaleLine => "sale line",
            EntityKind::Article => "article",
            EntityKind::Salesperson => "salesperson",
            EntityKind::Branch => "branch",
            EntityKind::Project => "project",
            EntityKind::ArticleGroup => "article group",
            EntityKind::UnitOfMeasure => "unit of measure",
        }
    }

    pub fn canonical_columns(self) -> &'static [ColumnDef] {
        match self {
            EntityKind::Partner => PARTNER,
            EntityKind::Address => ADDRESS,
            EntityKind::SalesOrder => SALES_ORDER,
            EntityKind::SaleLine => SALE_LINE,
            EntityKind::Article => ARTICLE,
            EntityKind::Salesperson => SALESPERSON,
            EntityKind::Branch => BRANCH,
            EntityKind::Project => PROJECT,
            EntityKind::ArticleGroup => ARTICLE_GROUP,
            EntityKind::UnitOfMeasure => UNIT_OF_MEASURE,
        }
    }

    /// Primary key columns; every projection must carry them
    pub fn key_columns(self) -> &'static [&'static str] {
        match self {
            EntityKind::Partner => &["partner_code"],
            EntityKind::Address => &["address_id"],
            EntityKind::SalesOrder => &["order_id"],
            EntityKind::SaleLine => &["order_id", "line_number"],
            EntityKind::Article => &["article_code"],
            EntityKind::Salesperson => &["salesperson_code"],
            EntityKind::Branch => &["branch_id"],
            EntityKind::Project => &["project_code"],
            EntityKind::ArticleGroup => &["group_code"],
            EntityKind::UnitOfMeasure => &["unit_id"],
        }
    }

    /// Fixed cap on collection reads; no other pagination exists
    pub fn row_cap(self) -> Option<i64> {
        match self {
            EntityKind::SalesOrder => Some(15),
            _ => None,
        }
    }

    pub fn canonical_column(self, name: &str) -> Option<&'static ColumnDef> {
        self.canonical_columns().iter().find(|c| c.name == name)
    }

    /// Quoted table identifier on `shard`
    pub fn table(self, shard: Shard) -> String {
        shard.table(self.base_table())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Shard × entity projection table
// ============================================================================

struct Projection {
    shard: Shard,
    kind: EntityKind,
    columns: &'static [&'static str],
}

/// Local subsets. Any (shard, entity) pair absent here is materialized in full.
const PROJECTIONS: &[Projection] = &[
    Projection {
        shard: Shard::Local1,
        kind: EntityKind::Partner,
        columns: &["partner_code", "partner_name", "address_id"],
    },
    Projection {
        shard: Shard::Local2,
        kind: EntityKind::Partner,
        columns: &["partner_code", "tax_id", "address_id"],
    },
    Projection {
        shard: Shard::Local3,
        kind: EntityKind::Partner,
        columns: &["partner_code", "email", "address_id"],
    },
    Projection {
        shard: Shard::Local4,
        kind: EntityKind::Partner,
        columns: &["partner_code", "address_id"],
    },
    Projection {
        shard: Shard::Local1,
        kind: EntityKind::Address,
        columns: &["address_id", "address_name"],
    },
    Projection {
        shard: Shard::Local2,
        kind: EntityKind::Address,
        columns: &["address_id", "city"],
    },
    Projection {
        shard: Shard::Local3,
        kind: EntityKind::Address,
        columns: &["address_id", "region"],
    },
    Projection {
        shard: Shard::Local4,
        kind: EntityKind::Address,
        columns: &[
            "address_id",
            "sector",
            "street",
            "street_number",
            "block",
            "floor",
        ],
    },
    Projection {
        shard: Shard::Local1,
        kind: EntityKind::Salesperson,
        columns: &["salesperson_code", "last_name", "first_name", "address_id"],
    },
    Projection {
        shard: Shard::Local2,
        kind: EntityKind::Salesperson,
        columns: &["salesperson_code", "base_salary", "address_id"],
    },
    Projection {
        shard: Shard::Local3,
        kind: EntityKind::Salesperson,
        columns: &["salesperson_code", "commission", "address_id"],
    },
    Projection {
        shard: Shard::Local4,
        kind: EntityKind::Salesperson,
        columns: &["salesperson_code", "email", "address_id"],
    },
];

/// Ordered column list a shard materializes for an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    kind: EntityKind,
    columns: Vec<&'static ColumnDef>,
}

impl ColumnSet {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn columns(&self) -> &[&'static ColumnDef] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.columns.len() == self.kind.canonical_columns().len()
    }

    /// Select list with null-defaults applied, in projection order
    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| match c.null_default {
                Some(default) => format!("COALESCE({name}, {default}) AS {name}", name = c.name),
                None => c.name.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Columns `shard` materializes for `kind`, in canonical order
pub fn project(shard: Shard, kind: EntityKind) -> ColumnSet {
    let canonical = kind.canonical_columns();
    let columns = match PROJECTIONS
        .iter()
        .find(|p| p.shard == shard && p.kind == kind)
    {
        Some(projection) => canonical
            .iter()
            .filter(|c| projection.columns.contains(&c.name))
            .collect(),
        None => canonical.iter().collect(),
    };
    ColumnSet { kind, columns }
}

// ============================================================================
// Partial rows
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Int(i32),
    Numeric(Decimal),
    Date(NaiveDate),
    Bool(bool),
    Null,
}

impl FieldValue {
    fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Int(_) => "int",
            FieldValue::Numeric(_) => "numeric",
            FieldValue::Date(_) => "date",
            FieldValue::Bool(_) => "bool",
            FieldValue::Null => "null",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v)
    }
}

impl From<Decimal> for FieldValue {
    fn from(v: Decimal) -> Self {
        FieldValue::Numeric(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(v: NaiveDate) -> Self {
        FieldValue::Date(v)
    }
}

/// A row carrying only the columns one shard materialized
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialRow {
    fields: BTreeMap<&'static str, FieldValue>,
}

impl PartialRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &'static str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(column, value.into());
        self
    }

    pub fn insert(&mut self, column: &'static str, value: impl Into<FieldValue>) {
        self.fields.insert(column, value.into());
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the columns in `set`
    pub fn restrict(&self, set: &ColumnSet) -> PartialRow {
        PartialRow {
            fields: self
                .fields
                .iter()
                .filter(|(name, _)| set.contains(name))
                .map(|(name, value)| (*name, value.clone()))
                .collect(),
        }
    }

    /// Values in the order `set` lists its columns; absent columns become NULL
    pub fn values_for(&self, set: &ColumnSet) -> Vec<FieldValue> {
        set.names()
            .map(|name| self.fields.get(name).cloned().unwrap_or(FieldValue::Null))
            .collect()
    }

    /// Scan exactly the columns of `set` out of `row`
    pub fn decode(row: &PgRow, set: &ColumnSet) -> Result<PartialRow> {
        if row.len() != set.len() {
            return Err(DataAccessError::scan(format!(
                "{} row has {} columns, projection selected {}",
                set.kind(),
                row.len(),
                set.len()
            )));
        }

        let mut partial = PartialRow::new();
        for (index, column) in set.columns().iter().enumerate() {
            let value: FieldValue = match column.ty {
                ColumnType::Text => row.try_get::<Option<String>, _>(index)?.into(),
                ColumnType::Int => row.try_get::<Option<i32>, _>(index)?.into(),
                ColumnType::Numeric => row.try_get::<Option<Decimal>, _>(index)?.into(),
                ColumnType::Date => row.try_get::<Option<NaiveDate>, _>(index)?.into(),
                ColumnType::Bool => row.try_get::<Option<bool>, _>(index)?.into(),
            };
            partial.insert(column.name, value);
        }
        Ok(partial)
    }

    fn mismatch(&self, column: &str, expected: &str, found: &FieldValue) -> DataAccessError {
        DataAccessError::scan(format!(
            "column '{}' expected {}, found {}",
            column,
            expected,
            found.type_name()
        ))
    }

    pub fn text(&self, column: &str) -> Result<String> {
        Ok(self.opt_text(column)?.unwrap_or_default())
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.fields.get(column) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Text(v)) => Ok(Some(v.clone())),
            Some(other) => Err(self.mismatch(column, "text", other)),
        }
    }

    pub fn int(&self, column: &str) -> Result<i32> {
        match self.fields.get(column) {
            None | Some(FieldValue::Null) => Ok(0),
            Some(FieldValue::Int(v)) => Ok(*v),
            Some(other) => Err(self.mismatch(column, "int", other)),
        }
    }

    pub fn numeric(&self, column: &str) -> Result<Decimal> {
        match self.fields.get(column) {
            None | Some(FieldValue::Null) => Ok(Decimal::ZERO),
            Some(FieldValue::Numeric(v)) => Ok(*v),
            Some(FieldValue::Int(v)) => Ok(Decimal::from(*v)),
            Some(other) => Err(self.mismatch(column, "numeric", other)),
        }
    }

    pub fn date(&self, column: &str) -> Result<Option<NaiveDate>> {
        match self.fields.get(column) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Date(v)) => Ok(Some(*v)),
            Some(other) => Err(self.mismatch(column, "date", other)),
        }
    }

    pub fn boolean(&self, column: &str) -> Result<bool> {
        match self.fields.get(column) {
            None | Some(FieldValue::Null) => Ok(false),
            Some(FieldValue::Bool(v)) => Ok(*v),
            Some(other) => Err(self.mismatch(column, "bool", other)),
        }
    }
}

// ============================================================================
// Reconstruction
// ============================================================================

/// A logical entity with a canonical full-column shape
pub trait Canonical: Sized + Send + Unpin + 'static {
    const KIND: EntityKind;

    /// Build the canonical record, zero-filling columns absent from `row`
    fn from_partial(row: &PartialRow) -> Result<Self>;

    /// Every canonical column of this record
    fn to_partial(&self) -> PartialRow;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum CanonicalEntity {
    Partner(Partner),
    Address(Address),
    SalesOrder(SalesOrder),
    SaleLine(SaleLine),
    Article(Article),
    Salesperson(Salesperson),
    Branch(Branch),
    Project(Project),
    ArticleGroup(ArticleGroup),
    UnitOfMeasure(UnitOfMeasure),
}

/// Map a partial row of `kind` onto its canonical shape
///
/// Columns foreign to `kind` are a shape mismatch and fail with a scan error.
pub fn reconstruct(kind: EntityKind, row: &PartialRow) -> Result<CanonicalEntity> {
    if let Some(stray) = row.columns().find(|c| kind.canonical_column(c).is_none()) {
        return Err(DataAccessError::scan(format!(
            "column '{}' is not part of {}",
            stray, kind
        )));
    }

    Ok(match kind {
        EntityKind::Partner => CanonicalEntity::Partner(Partner::from_partial(row)?),
        EntityKind::Address => CanonicalEntity::Address(Address::from_partial(row)?),
        EntityKind::SalesOrder => CanonicalEntity::SalesOrder(SalesOrder::from_partial(row)?),
        EntityKind::SaleLine => CanonicalEntity::SaleLine(SaleLine::from_partial(row)?),
        EntityKind::Article => CanonicalEntity::Article(Article::from_partial(row)?),
        EntityKind::Salesperson => CanonicalEntity::Salesperson(Salesperson::from_partial(row)?),
        EntityKind::Branch => CanonicalEntity::Branch(Branch::from_partial(row)?),
        EntityKind::Project => CanonicalEntity::Project(Project::from_partial(row)?),
        EntityKind::ArticleGroup => CanonicalEntity::ArticleGroup(ArticleGroup::from_partial(row)?),
        EntityKind::UnitOfMeasure => {
            CanonicalEntity::UnitOfMeasure(UnitOfMeasure::from_partial(row)?)
        }
    })
}
