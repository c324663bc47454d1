//! Canonical sales-domain entities and insert payloads
//!
//! Every struct here is the full-column shape all shards reconcile against.
//! Reads from a local shard fill the columns it lacks with zero values.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::database::projection::{Canonical, EntityKind, PartialRow};
use crate::dates;
use crate::error::{DataAccessError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Partner {
    pub partner_code: String,
    pub partner_name: String,
    pub tax_id: String,
    pub email: String,
    pub address_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub address_id: i32,
    pub address_name: String,
    pub city: String,
    pub region: String,
    pub sector: String,
    pub street: String,
    pub street_number: String,
    pub block: String,
    pub floor: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesOrder {
    pub order_id: i32,
    pub partner_code: String,
    pub status: String,
    #[serde(deserialize_with = "dates::deserialize_optional")]
    pub order_date: Option<NaiveDate>,
    #[serde(deserialize_with = "dates::deserialize_optional")]
    pub delivery_date: Option<NaiveDate>,
    pub total: Decimal,
    pub vat: Decimal,
    pub discount: Decimal,
    pub currency: String,
    pub amount_paid: Decimal,
    pub notes: Option<String>,
    pub salesperson_code: i32,
    pub branch_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleLine {
    pub order_id: i32,
    pub line_number: i32,
    pub article_code: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub discount: Decimal,
    pub vat: Decimal,
    pub line_total: Decimal,
    pub project_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub article_code: String,
    pub article_name: String,
    pub group_code: i32,
    pub stock_quantity: i32,
    pub unit_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Salesperson {
    pub salesperson_code: i32,
    pub last_name: String,
    pub first_name: String,
    pub base_salary: Decimal,
    pub commission: Decimal,
    pub email: String,
    pub address_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branch {
    pub branch_id: i32,
    pub branch_name: String,
    pub address_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub project_code: String,
    pub project_name: String,
    #[serde(deserialize_with = "dates::deserialize_optional")]
    pub valid_from: Option<NaiveDate>,
    #[serde(deserialize_with = "dates::deserialize_optional")]
    pub valid_to: Option<NaiveDate>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleGroup {
    pub group_code: i32,
    pub group_name: String,
    pub group_details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitOfMeasure {
    pub unit_id: i32,
    pub unit_name: String,
    pub height: Decimal,
    pub width: Decimal,
    pub length: Decimal,
}

// ============================================================================
// Canonical reconstruction
// ============================================================================

impl Canonical for Partner {
    const KIND: EntityKind = EntityKind::Partner;

    fn from_partial(row: &PartialRow) -> Result<Self> {
        Ok(Self {
            partner_code: row.text("partner_code")?,
            partner_name: row.text("partner_name")?,
            tax_id: row.text("tax_id")?,
            email: row.text("email")?,
            address_id: row.int("address_id")?,
        })
    }

    fn to_partial(&self) -> PartialRow {
        PartialRow::new()
            .with("partner_code", self.partner_code.as_str())
            .with("partner_name", self.partner_name.as_str())
            .with("tax_id", self.tax_id.as_str())
            .with("email", self.email.as_str())
            .with("address_id", self.address_id)
    }
}

impl Canonical for Address {
    const KIND: EntityKind = EntityKind::Address;

    fn from_partial(row: &PartialRow) -> Result<Self> {
        Ok(Self {
            address_id: row.int("address_id")?,
            address_name: row.text("address_name")?,
            city: row.text("city")?,
            region: row.text("region")?,
            sector: row.text("sector")?,
            street: row.text("street")?,
            street_number: row.text("street_number")?,
            block: row.text("block")?,
            floor: row.int("floor")?,
        })
    }

    fn to_partial(&self) -> PartialRow {
        PartialRow::new()
            .with("address_id", self.address_id)
            .with("address_name", self.address_name.as_str())
            .with("city", self.city.as_str())
            .with("region", self.region.as_str())
            .with("sector", self.sector.as_str())
            .with("street", self.street.as_str())
            .with("street_number", self.street_number.as_str())
            .with("block", self.block.as_str())
            .with("floor", self.floor)
    }
}

impl Canonical for SalesOrder {
    const KIND: EntityKind = EntityKind::SalesOrder;

    fn from_partial(row: &PartialRow) -> Result<Self> {
        Ok(Self {
            order_id: row.int("order_id")?,
            partner_code: row.text("partner_code")?,
            status: row.text("status")?,
            order_date: row.date("order_date")?,
            delivery_date: row.date("delivery_date")?,
            total: row.numeric("total")?,
            vat: row.numeric("vat")?,
            discount: row.numeric("discount")?,
            currency: row.text("currency")?,
            amount_paid: row.numeric("amount_paid")?,
            notes: row.opt_text("notes")?,
            salesperson_code: row.int("salesperson_code")?,
            branch_id: row.int("branch_id")?,
        })
    }

    fn to_partial(&self) -> PartialRow {
        PartialRow::new()
            .with("order_id", self.order_id)
            .with("partner_code", self.partner_code.as_str())
            .with("status", self.status.as_str())
            .with("order_date", self.order_date)
            .with("delivery_date", self.delivery_date)
            .with("total", self.total)
            .with("vat", self.vat)
            .with("discount", self.discount)
            .with("currency", self.currency.as_str())
            .with("amount_paid", self.amount_paid)
            .with("notes", self.notes.clone())
            .with("salesperson_code", self.salesperson_code)
            .with("branch_id", self.branch_id)
    }
}

impl Canonical for SaleLine {
    const KIND: EntityKind = EntityKind::SaleLine;

    fn from_partial(row: &PartialRow) -> Result<Self> {
        Ok(Self {
            order_id: row.int("order_id")?,
            line_number: row.int("line_number")?,
            article_code: row.text("article_code")?,
            quantity: row.numeric("quantity")?,
            price: row.numeric("price")?,
            discount: row.numeric("discount")?,
            vat: row.numeric("vat")?,
            line_total: row.numeric("line_total")?,
            project_code: row.opt_text("project_code")?,
        })
    }

    fn to_partial(&self) -> PartialRow {
        PartialRow::new()
            .with("order_id", self.order_id)
            .with("line_number", self.line_number)
            .with("article_code", self.article_code.as_str())
            .with("quantity", self.quantity)
            .with("price", self.price)
            .with("discount", self.discount)
            .with("vat", self.vat)
            .with("line_total", self.line_total)
            .with("project_code", self.project_code.clone())
    }
}

impl Canonical for Article {
    const KIND: EntityKind = EntityKind::Article;

    fn from_partial(row: &PartialRow) -> Result<Self> {
        Ok(Self {
            article_code: row.text("article_code")?,
            article_name: row.text("article_name")?,
            group_code: row.int("group_code")?,
            stock_quantity: row.int("stock_quantity")?,
            unit_id: row.int("unit_id")?,
        })
    }

    fn to_partial(&self) -> PartialRow {
        PartialRow::new()
            .with("article_code", self.article_code.as_str())
            .with("article_name", self.article_name.as_str())
            .with("group_code", self.group_code)
            .with("stock_quantity", self.stock_quantity)
            .with("unit_id", self.unit_id)
    }
}

impl Canonical for Salesperson {
    const KIND: EntityKind = EntityKind::Salesperson;

    fn from_partial(row: &PartialRow) -> Result<Self> {
        Ok(Self {
            salesperson_code: row.int("salesperson_code")?,
            last_name: row.text("last_name")?,
            first_name: row.text("first_name")?,
            base_salary: row.numeric("base_salary")?,
            commission: row.numeric("commission")?,
            email: row.text("email")?,
            address_id: row.int("address_id")?,
        })
    }

    fn to_partial(&self) -> PartialRow {
        PartialRow::new()
            .with("salesperson_code", self.salesperson_code)
            .with("last_name", self.last_name.as_str())
            .with("first_name", self.first_name.as_str())
            .with("base_salary", self.base_salary)
            .with("commission", self.commission)
            .with("email", self.email.as_str())
            .with("address_id", self.address_id)
    }
}

impl Canonical for Branch {
    const KIND: EntityKind = EntityKind::Branch;

    fn from_partial(row: &PartialRow) -> Result<Self> {
        Ok(Self {
            branch_id: row.int("branch_id")?,
            branch_name: row.text("branch_name")?,
            address_id: row.int("address_id")?,
        })
    }

    fn to_partial(&self) -> PartialRow {
        PartialRow::new()
            .with("branch_id", self.branch_id)
            .with("branch_name", self.branch_name.as_str())
            .with("address_id", self.address_id)
    }
}

impl Canonical for Project {
    const KIND: EntityKind = EntityKind::Project;

    fn from_partial(row: &PartialRow) -> Result<Self> {
        Ok(Self {
            project_code: row.text("project_code")?,
            project_name: row.text("project_name")?,
            valid_from: row.date("valid_from")?,
            valid_to: row.date("valid_to")?,
            active: row.boolean("active")?,
        })
    }

    fn to_partial(&self) -> PartialRow {
        PartialRow::new()
            .with("project_code", self.project_code.as_str())
            .with("project_name", self.project_name.as_str())
            .with("valid_from", self.valid_from)
            .with("valid_to", self.valid_to)
            .with("active", self.active)
    }
}

impl Canonical for ArticleGroup {
    const KIND: EntityKind = EntityKind::ArticleGroup;

    fn from_partial(row: &PartialRow) -> Result<Self> {
        Ok(Self {
            group_code: row.int("group_code")?,
            group_name: row.text("group_name")?,
            group_details: row.text("group_details")?,
        })
    }

    fn to_partial(&self) -> PartialRow {
        PartialRow::new()
            .with("group_code", self.group_code)
            .with("group_name", self.group_name.as_str())
            .with("group_details", self.group_details.as_str())
    }
}

impl Canonical for UnitOfMeasure {
    const KIND: EntityKind = EntityKind::UnitOfMeasure;

    fn from_partial(row: &PartialRow) -> Result<Self> {
        Ok(Self {
            unit_id: row.int("unit_id")?,
            unit_name: row.text("unit_name")?,
            height: row.numeric("height")?,
            width: row.numeric("width")?,
            length: row.numeric("length")?,
        })
    }

    fn to_partial(&self) -> PartialRow {
        PartialRow::new()
            .with("unit_id", self.unit_id)
            .with("unit_name", self.unit_name.as_str())
            .with("height", self.height)
            .with("width", self.width)
            .with("length", self.length)
    }
}

// ============================================================================
// Insert payloads
// ============================================================================

/// Partner plus an optional inline address created first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewPartner {
    pub partner: Partner,
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewSalesperson {
    pub salesperson: Salesperson,
    pub address: Option<Address>,
}

/// Branch plus an optional inline address, always created in the global shard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewBranch {
    pub branch: Branch,
    pub address: Option<Address>,
}

/// Order header plus lines, numbered 1..N in submission order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewSalesOrder {
    pub order: SalesOrder,
    pub lines: Vec<SaleLine>,
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DataAccessError::validation(format!("{} is required", field)));
    }
    Ok(())
}

fn non_negative(value: Decimal, field: &str) -> Result<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(DataAccessError::validation(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(())
}

fn reference(address: &Option<Address>, address_id: i32, owner: &str) -> Result<()> {
    if address.is_none() && address_id <= 0 {
        return Err(DataAccessError::validation(format!(
            "{} needs an inline address or an existing address_id",
            owner
        )));
    }
    Ok(())
}

impl NewPartner {
    pub fn validate(&self) -> Result<()> {
        require(&self.partner.partner_code, "partner_code")?;
        reference(&self.address, self.partner.address_id, "partner")
    }
}

impl NewSalesperson {
    pub fn validate(&self) -> Result<()> {
        require(&self.salesperson.last_name, "last_name")?;
        non_negative(self.salesperson.base_salary, "base_salary")?;
        non_negative(self.salesperson.commission, "commission")?;
        reference(&self.address, self.salesperson.address_id, "salesperson")
    }
}

impl NewBranch {
    pub fn validate(&self) -> Result<()> {
        require(&self.branch.branch_name, "branch_name")?;
        reference(&self.address, self.branch.address_id, "branch")
    }
}

impl SaleLine {
    pub fn validate(&self) -> Result<()> {
        require(&self.article_code, "article_code")?;
        non_negative(self.quantity, "quantity")?;
        non_negative(self.price, "price")?;
        non_negative(self.discount, "discount")
    }
}

impl NewSalesOrder {
    pub fn validate(&self) -> Result<()> {
        let order = &self.order;
        require(&order.partner_code, "partner_code")?;
        let Some(order_date) = order.order_date else {
            return Err(DataAccessError::validation("order_date is required"));
        };
        if let Some(delivery) = order.delivery_date {
            if delivery < order_date {
                return Err(DataAccessError::validation(
                    "delivery_date precedes order_date",
                ));
            }
        }
        non_negative(order.total, "total")?;
        non_negative(order.amount_paid, "amount_paid")?;
        for (index, line) in self.lines.iter().enumerate() {
            line.validate().map_err(|e| match e {
                DataAccessError::Validation(msg) => {
                    DataAccessError::validation(format!("line {}: {}", index + 1, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

impl Article {
    pub fn validate(&self) -> Result<()> {
        require(&self.article_code, "article_code")?;
        require(&self.article_name, "article_name")?;
        if self.stock_quantity < 0 {
            return Err(DataAccessError::validation(
                "stock_quantity must not be negative",
            ));
        }
        Ok(())
    }
}

impl Project {
    pub fn validate(&self) -> Result<()> {
        require(&self.project_code, "project_code")?;
        require(&self.project_name, "project_name")?;
        if let (Some(from), Some(to)) = (self.valid_from, self.valid_to) {
            if to < from {
                return Err(DataAccessError::validation("valid_to precedes valid_from"));
            }
        }
        Ok(())
    }
}
