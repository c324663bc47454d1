//! Narrow interface the outer layer calls into
//!
//! [`SalesPort`] is the whole surface: typed collection reads, coordinated
//! inserts returning generated keys, sale-line edits and report queries. The
//! HTTP glue depends only on this trait; [`SalesFederation`] implements it
//! over a [`ShardRegistry`].

use async_trait::async_trait;
use tracing::info;

use crate::database::coordinator::{GeneratedKeys, InsertPlan};
use crate::database::projection::Canonical;
use crate::database::registry::ShardRegistry;
use crate::database::repository;
use crate::error::Result;
use crate::model::{
    Address, Article, ArticleGroup, Branch, NewBranch, NewPartner, NewSalesOrder, NewSalesperson,
    Partner, Project, SaleLine, SalesOrder, Salesperson, UnitOfMeasure,
};
use crate::reports::{
    self, GroupSales, QuarterDiscount, RegionQuantity, ReportFilter, ReportRow, WeekdayVolume,
};
use crate::shard::Shard;

#[async_trait]
pub trait SalesPort: Send + Sync {
    /// Round-trip to the shard's database
    async fn ping(&self, shard: Shard) -> Result<()>;

    // ── Collections ────────────────────────────────────────────

    async fn partners(&self, shard: Shard) -> Result<Vec<Partner>>;
    async fn addresses(&self, shard: Shard) -> Result<Vec<Address>>;
    /// At most 15 orders, lowest ids first
    async fn sales_orders(&self, shard: Shard) -> Result<Vec<SalesOrder>>;
    async fn sale_lines(&self, shard: Shard, order_id: i32) -> Result<Vec<SaleLine>>;
    async fn articles(&self, shard: Shard) -> Result<Vec<Article>>;
    async fn salespeople(&self, shard: Shard) -> Result<Vec<Salesperson>>;
    async fn branches(&self, shard: Shard) -> Result<Vec<Branch>>;
    async fn projects(&self, shard: Shard) -> Result<Vec<Project>>;
    async fn article_groups(&self, shard: Shard) -> Result<Vec<ArticleGroup>>;
    async fn units(&self, shard: Shard) -> Result<Vec<UnitOfMeasure>>;

    // ── Writes ─────────────────────────────────────────────────

    async fn insert_partner(&self, shard: Shard, payload: NewPartner) -> Result<GeneratedKeys>;
    async fn insert_salesperson(
        &self,
        shard: Shard,
        payload: NewSalesperson,
    ) -> Result<GeneratedKeys>;
    /// The address and branch id come from the global shard
    async fn insert_branch(&self, shard: Shard, payload: NewBranch) -> Result<GeneratedKeys>;
    async fn insert_sales_order(
        &self,
        shard: Shard,
        payload: NewSalesOrder,
    ) -> Result<GeneratedKeys>;
    /// Append a line to an existing order
    async fn insert_sale_line(&self, shard: Shard, line: SaleLine) -> Result<GeneratedKeys>;
    async fn update_sale_line(
        &self,
        shard: Shard,
        order_id: i32,
        line_number: i32,
        line: SaleLine,
    ) -> Result<()>;
    async fn delete_sale_line(&self, shard: Shard, order_id: i32, line_number: i32)
        -> Result<()>;
    async fn insert_article(&self, shard: Shard, article: Article) -> Result<GeneratedKeys>;
    async fn insert_project(&self, shard: Shard, project: Project) -> Result<GeneratedKeys>;

    // ── Reports ────────────────────────────────────────────────

    async fn form_report(&self, shard: Shard, filter: ReportFilter) -> Result<Vec<ReportRow>>;
    /// Sums row followed by averages row
    async fn grouped_form_report(
        &self,
        shard: Shard,
        filter: ReportFilter,
    ) -> Result<Vec<ReportRow>>;
    async fn group_sales(&self, shard: Shard) -> Result<Vec<GroupSales>>;
    async fn region_quantities(&self, shard: Shard) -> Result<Vec<RegionQuantity>>;
    async fn quarter_discounts(&self, shard: Shard) -> Result<Vec<QuarterDiscount>>;
    async fn weekday_volumes(
        &self,
        shard: Shard,
        filter: ReportFilter,
    ) -> Result<Vec<WeekdayVolume>>;
}

/// Database-backed [`SalesPort`]
#[derive(Clone, Debug)]
pub struct SalesFederation {
    registry: ShardRegistry,
}

impl SalesFederation {
    pub fn new(registry: ShardRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ShardRegistry {
        &self.registry
    }

    async fn fetch<T: Canonical>(&self, shard: Shard) -> Result<Vec<T>> {
        repository::fetch_all(self.registry.handle(shard)).await
    }

    async fn execute(&self, shard: Shard, plan: InsertPlan) -> Result<GeneratedKeys> {
        plan.execute(self.registry.handle(shard), self.registry.global())
            .await
    }
}

#[async_trait]
impl SalesPort for SalesFederation {
    async fn ping(&self, shard: Shard) -> Result<()> {
        self.registry.handle(shard).ping().await
    }

    async fn partners(&self, shard: Shard) -> Result<Vec<Partner>> {
        self.fetch(shard).await
    }

    async fn addresses(&self, shard: Shard) -> Result<Vec<Address>> {
        self.fetch(shard).await
    }

    async fn sales_orders(&self, shard: Shard) -> Result<Vec<SalesOrder>> {
        self.fetch(shard).await
    }

    async fn sale_lines(&self, shard: Shard, order_id: i32) -> Result<Vec<SaleLine>> {
        repository::fetch_sale_lines(self.registry.handle(shard), order_id).await
    }

    async fn articles(&self, shard: Shard) -> Result<Vec<Article>> {
        self.fetch(shard).await
    }

    async fn salespeople(&self, shard: Shard) -> Result<Vec<Salesperson>> {
        self.fetch(shard).await
    }

    async fn branches(&self, shard: Shard) -> Result<Vec<Branch>> {
        self.fetch(shard).await
    }

    async fn projects(&self, shard: Shard) -> Result<Vec<Project>> {
        self.fetch(shard).await
    }

    async fn article_groups(&self, shard: Shard) -> Result<Vec<ArticleGroup>> {
        self.fetch(shard).await
    }

    async fn units(&self, shard: Shard) -> Result<Vec<UnitOfMeasure>> {
        self.fetch(shard).await
    }

    async fn insert_partner(&self, shard: Shard, payload: NewPartner) -> Result<GeneratedKeys> {
        payload.validate()?;
        let keys = self.execute(shard, InsertPlan::partner(payload)).await?;
        info!(%shard, partner = ?keys.partner_code, address = ?keys.address_id, "Partner created");
        Ok(keys)
    }

    async fn insert_salesperson(
        &self,
        shard: Shard,
        payload: NewSalesperson,
    ) -> Result<GeneratedKeys> {
        payload.validate()?;
        self.execute(shard, InsertPlan::salesperson(payload)).await
    }

    async fn insert_branch(&self, shard: Shard, payload: NewBranch) -> Result<GeneratedKeys> {
        payload.validate()?;
        self.execute(shard, InsertPlan::branch(payload)).await
    }

    async fn insert_sales_order(
        &self,
        shard: Shard,
        payload: NewSalesOrder,
    ) -> Result<GeneratedKeys> {
        payload.validate()?;
        let keys = self.execute(shard, InsertPlan::sales_order(payload)).await?;
        info!(
            %shard,
            order_id = ?keys.order_id,
            lines = keys.line_numbers.len(),
            "Sales order created"
        );
        Ok(keys)
    }

    async fn insert_sale_line(&self, shard: Shard, line: SaleLine) -> Result<GeneratedKeys> {
        line.validate()?;
        self.execute(shard, InsertPlan::sale_line(line)).await
    }

    async fn update_sale_line(
        &self,
        shard: Shard,
        order_id: i32,
        line_number: i32,
        line: SaleLine,
    ) -> Result<()> {
        repository::update_sale_line(self.registry.handle(shard), order_id, line_number, &line)
            .await
    }

    async fn delete_sale_line(
        &self,
        shard: Shard,
        order_id: i32,
        line_number: i32,
    ) -> Result<()> {
        repository::delete_sale_line(self.registry.handle(shard), order_id, line_number).await
    }

    async fn insert_article(&self, shard: Shard, article: Article) -> Result<GeneratedKeys> {
        article.validate()?;
        self.execute(shard, InsertPlan::article(article)).await
    }

    async fn insert_project(&self, shard: Shard, project: Project) -> Result<GeneratedKeys> {
        project.validate()?;
        self.execute(shard, InsertPlan::project(project)).await
    }

    async fn form_report(&self, shard: Shard, filter: ReportFilter) -> Result<Vec<ReportRow>> {
        reports::form_report(self.registry.handle(shard), &filter).await
    }

    async fn grouped_form_report(
        &self,
        shard: Shard,
        filter: ReportFilter,
    ) -> Result<Vec<ReportRow>> {
        reports::grouped_form_report(self.registry.handle(shard), &filter).await
    }

    async fn group_sales(&self, shard: Shard) -> Result<Vec<GroupSales>> {
        reports::group_sales(self.registry.handle(shard)).await
    }

    async fn region_quantities(&self, shard: Shard) -> Result<Vec<RegionQuantity>> {
        reports::region_quantities(self.registry.handle(shard), self.registry.global()).await
    }

    async fn quarter_discounts(&self, shard: Shard) -> Result<Vec<QuarterDiscount>> {
        reports::quarter_discounts(self.registry.handle(shard)).await
    }

    async fn weekday_volumes(
        &self,
        shard: Shard,
        filter: ReportFilter,
    ) -> Result<Vec<WeekdayVolume>> {
        reports::weekday_volumes(self.registry.handle(shard), &filter).await
    }
}
