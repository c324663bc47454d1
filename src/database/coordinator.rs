//! Key & reference coordinator
//!
//! Multi-entity writes are expressed as an [`InsertPlan`]: an ordered list of
//! [`Stage`]s, dependency first. Each stage may read keys captured by earlier
//! stages from [`GeneratedKeys`] and records the keys it generates itself.
//!
//! A plan runs inside one transaction on the owning shard. Stages that target
//! the global shard (branch addresses and branch ids) run in a second
//! transaction on global. Commit order is owning shard, then global; a failure
//! before the first commit rolls both back. If the global commit fails after
//! the owning shard committed, the owning-shard rows stay and the error is
//! returned.

use serde::Serialize;
use sqlx::postgres::Postgres;
use sqlx::{PgConnection, Transaction};
use tracing::{info, warn};

use crate::database::keys::{next_key, KeyScope};
use crate::database::projection::{project, Canonical, EntityKind};
use crate::database::registry::ShardHandle;
use crate::database::repository;
use crate::error::{DataAccessError, Result};
use crate::model::{
    Address, Article, Branch, NewBranch, NewPartner, NewSalesOrder, NewSalesperson, Partner,
    Project, SaleLine, SalesOrder, Salesperson,
};
use crate::shard::Shard;

/// Keys produced while executing a plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedKeys {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salesperson_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub line_numbers: Vec<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_code: Option<String>,
}

/// Which transaction a stage writes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Owner,
    Global,
}

/// One insert step
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Address { target: Target, address: Address },
    Partner(Partner),
    Salesperson(Salesperson),
    Branch(Branch),
    SalesOrder(SalesOrder),
    SaleLine(SaleLine),
    Article(Article),
    Project(Project),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Address { .. } => "address",
            Stage::Partner(_) => "partner",
            Stage::Salesperson(_) => "salesperson",
            Stage::Branch(_) => "branch",
            Stage::SalesOrder(_) => "sales_order",
            Stage::SaleLine(_) => "sale_line",
            Stage::Article(_) => "article",
            Stage::Project(_) => "project",
        }
    }

    /// Fill foreign keys captured by earlier stages
    pub fn inject(&mut self, keys: &GeneratedKeys) {
        match self {
            Stage::Partner(p) => {
                if let Some(id) = keys.address_id {
                    p.address_id = id;
                }
            }
            Stage::Salesperson(s) => {
                if let Some(id) = keys.address_id {
                    s.address_id = id;
                }
            }
            Stage::Branch(b) => {
                if let Some(id) = keys.address_id {
                    b.address_id = id;
                }
            }
            Stage::SaleLine(line) => {
                if let Some(id) = keys.order_id {
                    line.order_id = id;
                }
            }
            Stage::Address { .. }
            | Stage::SalesOrder(_)
            | Stage::Article(_)
            | Stage::Project(_) => {}
        }
    }
}

/// Ordered, dependency-first write protocol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertPlan {
    stages: Vec<Stage>,
}

impl InsertPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn partner(payload: NewPartner) -> Self {
        let plan = match payload.address {
            Some(address) => Self::new().then(Stage::Address {
                target: Target::Owner,
                address,
            }),
            None => Self::new(),
        };
        plan.then(Stage::Partner(payload.partner))
    }

    pub fn salesperson(payload: NewSalesperson) -> Self {
        let plan = match payload.address {
            Some(address) => Self::new().then(Stage::Address {
                target: Target::Owner,
                address,
            }),
            None => Self::new(),
        };
        plan.then(Stage::Salesperson(payload.salesperson))
    }

    /// Branch addresses always live in the global shard
    pub fn branch(payload: NewBranch) -> Self {
        let plan = match payload.address {
            Some(address) => Self::new().then(Stage::Address {
                target: Target::Global,
                address,
            }),
            None => Self::new(),
        };
        plan.then(Stage::Branch(payload.branch))
    }

    pub fn sales_order(payload: NewSalesOrder) -> Self {
        payload
            .lines
            .into_iter()
            .fold(Self::new().then(Stage::SalesOrder(payload.order)), |plan, line| {
                plan.then(Stage::SaleLine(line))
            })
    }

    pub fn sale_line(line: SaleLine) -> Self {
        Self::new().then(Stage::SaleLine(line))
    }

    pub fn article(article: Article) -> Self {
        Self::new().then(Stage::Article(article))
    }

    pub fn project(project: Project) -> Self {
        Self::new().then(Stage::Project(project))
    }

    /// Run every stage; all-or-nothing per shard
    #[tracing::instrument(
        skip(self, owner, global),
        fields(owner = %owner.shard(), stages = self.stages.len())
    )]
    pub async fn execute(self, owner: &ShardHandle, global: &ShardHandle) -> Result<GeneratedKeys> {
        let mut ctx = StageContext::begin(owner, global).await?;
        let mut keys = GeneratedKeys::default();

        for (index, mut stage) in self.stages.into_iter().enumerate() {
            stage.inject(&keys);
            if let Err(e) = ctx.run(&stage, &mut keys).await {
                warn!(
                    stage = stage.name(),
                    index,
                    error = %e,
                    "Insert stage failed, rolling back"
                );
                ctx.rollback().await;
                return Err(e);
            }
        }

        ctx.commit().await?;
        info!(?keys, "Insert plan committed");
        Ok(keys)
    }
}

/// Open transactions for one plan execution
struct StageContext<'a> {
    owner: &'a ShardHandle,
    global: &'a ShardHandle,
    owner_tx: Transaction<'static, Postgres>,
    global_tx: Option<Transaction<'static, Postgres>>,
}

impl<'a> StageContext<'a> {
    async fn begin(owner: &'a ShardHandle, global: &'a ShardHandle) -> Result<StageContext<'a>> {
        Ok(Self {
            owner,
            global,
            owner_tx: owner.begin().await?,
            global_tx: None,
        })
    }

    fn handle(&self, target: Target) -> &'a ShardHandle {
        match target {
            Target::Global if !self.owner.shard().is_global() => self.global,
            _ => self.owner,
        }
    }

    /// Connection for `target`; the global transaction opens on first use
    async fn conn(&mut self, target: Target) -> Result<&mut PgConnection> {
        if target == Target::Global && !self.owner.shard().is_global() {
            let tx = match self.global_tx.take() {
                Some(tx) => tx,
                None => self.global.begin().await?,
            };
            return Ok(&mut **self.global_tx.insert(tx));
        }
        Ok(&mut *self.owner_tx)
    }

    async fn allocate(
        &mut self,
        target: Target,
        kind: EntityKind,
        column: &'static str,
        scope: Option<KeyScope>,
    ) -> Result<i32> {
        let handle = self.handle(target);
        let table = handle.table(kind);
        let conn = self.conn(target).await?;
        next_key(conn, &table, column, scope)
            .await
            .map_err(|e| handle.error(e))
    }

    async fn insert<T: Canonical>(&mut self, target: Target, record: &T) -> Result<()> {
        let handle = self.handle(target);
        let set = project(handle.shard(), T::KIND);
        let table = handle.table(T::KIND);
        let conn = self.conn(target).await?;
        repository::insert_row(conn, &table, &set, &record.to_partial())
            .await
            .map_err(|e| handle.error(e))
    }

    async fn run(&mut self, stage: &Stage, keys: &mut GeneratedKeys) -> Result<()> {
        match stage {
            Stage::Address { target, address } => {
                let mut address = address.clone();
                address.address_id = self
                    .allocate(*target, EntityKind::Address, "address_id", None)
                    .await?;
                self.insert(*target, &address).await?;
                keys.address_id = Some(address.address_id);
            }
            Stage::Partner(partner) => {
                self.insert(Target::Owner, partner).await?;
                keys.partner_code = Some(partner.partner_code.clone());
            }
            Stage::Salesperson(salesperson) => {
                let mut salesperson = salesperson.clone();
                salesperson.salesperson_code = self
                    .allocate(Target::Owner, EntityKind::Salesperson, "salesperson_code", None)
                    .await?;
                self.insert(Target::Owner, &salesperson).await?;
                keys.salesperson_code = Some(salesperson.salesperson_code);
            }
            Stage::Branch(branch) => {
                // Global is the id authority and keeps a copy of every branch
                let mut branch = branch.clone();
                branch.branch_id = self
                    .allocate(Target::Global, EntityKind::Branch, "branch_id", None)
                    .await?;
                self.insert(Target::Owner, &branch).await?;
                if !self.owner.shard().is_global() {
                    self.insert(Target::Global, &branch).await?;
                }
                keys.branch_id = Some(branch.branch_id);
            }
            Stage::SalesOrder(order) => {
                let mut order = order.clone();
                order.order_id = self
                    .allocate(Target::Owner, EntityKind::SalesOrder, "order_id", None)
                    .await?;
                self.insert(Target::Owner, &order).await?;
                keys.order_id = Some(order.order_id);
            }
            Stage::SaleLine(line) => {
                let mut line = line.clone();
                if keys.order_id.is_none() {
                    let table = self.owner.table(EntityKind::SalesOrder);
                    let owner = self.owner;
                    let conn = self.conn(Target::Owner).await?;
                    let exists = repository::order_exists(conn, &table, line.order_id)
                        .await
                        .map_err(|e| owner.error(e))?;
                    if !exists {
                        return Err(DataAccessError::NotFound {
                            entity: EntityKind::SalesOrder.label(),
                            key: line.order_id.to_string(),
                        });
                    }
                }
                line.line_number = self
                    .allocate(
                        Target::Owner,
                        EntityKind::SaleLine,
                        "line_number",
                        Some(KeyScope {
                            column: "order_id",
                            value: line.order_id,
                        }),
                    )
                    .await?;
                self.insert(Target::Owner, &line).await?;
                keys.order_id.get_or_insert(line.order_id);
                keys.line_numbers.push(line.line_number);
            }
            Stage::Article(article) => {
                self.insert(Target::Owner, article).await?;
                keys.article_code = Some(article.article_code.clone());
            }
            Stage::Project(project) => {
                self.insert(Target::Owner, project).await?;
                keys.project_code = Some(project.project_code.clone());
            }
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let owner = self.owner;
        let global = self.global;

        self.owner_tx.commit().await.map_err(|e| owner.error(e))?;
        if let Some(tx) = self.global_tx {
            tx.commit().await.map_err(|e| {
                warn!(
                    owner = %owner.shard(),
                    "Global commit failed after owning shard committed"
                );
                global.error(e)
            })?;
        }
        Ok(())
    }

    async fn rollback(self) {
        if let Err(e) = self.owner_tx.rollback().await {
            warn!(shard = %self.owner.shard(), error = %e, "Rollback failed");
        }
        if let Some(tx) = self.global_tx {
            if let Err(e) = tx.rollback().await {
                warn!(shard = %Shard::Global, error = %e, "Rollback failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn stage_names(plan: &InsertPlan) -> Vec<&'static str> {
        plan.stages().iter().map(Stage::name).collect()
    }

    #[test]
    fn inline_address_comes_first() {
        let plan = InsertPlan::partner(NewPartner {
            partner: Partner {
                partner_code: "P-1".into(),
                ..Default::default()
            },
            address: Some(Address {
                city: "Cluj".into(),
                ..Default::default()
            }),
        });
        assert_eq!(stage_names(&plan), vec!["address", "partner"]);
    }

    #[test]
    fn existing_address_skips_address_stage() {
        let plan = InsertPlan::salesperson(NewSalesperson {
            salesperson: Salesperson {
                last_name: "Pop".into(),
                address_id: 4,
                ..Default::default()
            },
            address: None,
        });
        assert_eq!(stage_names(&plan), vec!["salesperson"]);
    }

    #[test]
    fn branch_address_targets_global() {
        let plan = InsertPlan::branch(NewBranch {
            branch: Branch {
                branch_name: "Iasi".into(),
                ..Default::default()
            },
            address: Some(Address::default()),
        });
        assert!(matches!(
            plan.stages()[0],
            Stage::Address {
                target: Target::Global,
                ..
            }
        ));
    }

    #[test]
    fn order_lines_follow_header_in_submission_order() {
        let lines = ["A-1", "A-2", "A-3"]
            .into_iter()
            .map(|code| SaleLine {
                article_code: code.into(),
                quantity: Decimal::ONE,
                ..Default::default()
            })
            .collect();
        let plan = InsertPlan::sales_order(NewSalesOrder {
            order: SalesOrder::default(),
            lines,
        });
        assert_eq!(
            stage_names(&plan),
            vec!["sales_order", "sale_line", "sale_line", "sale_line"]
        );
        let codes: Vec<_> = plan
            .stages()
            .iter()
            .filter_map(|s| match s {
                Stage::SaleLine(l) => Some(l.article_code.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec!["A-1", "A-2", "A-3"]);
    }

    #[test]
    fn inject_fills_captured_keys() {
        let keys = GeneratedKeys {
            address_id: Some(12),
            order_id: Some(30),
            ..Default::default()
        };

        let mut stage = Stage::Partner(Partner {
            address_id: 1,
            ..Default::default()
        });
        stage.inject(&keys);
        assert!(matches!(stage, Stage::Partner(ref p) if p.address_id == 12));

        let mut stage = Stage::SaleLine(SaleLine::default());
        stage.inject(&keys);
        assert!(matches!(stage, Stage::SaleLine(ref l) if l.order_id == 30));
    }

    #[test]
    fn inject_keeps_caller_reference_without_capture() {
        let mut stage = Stage::Branch(Branch {
            address_id: 9,
            ..Default::default()
        });
        stage.inject(&GeneratedKeys::default());
        assert!(matches!(stage, Stage::Branch(ref b) if b.address_id == 9));
    }

    #[test]
    fn keys_serialize_only_what_was_generated() {
        let keys = GeneratedKeys {
            address_id: Some(3),
            partner_code: Some("P-1".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&keys).unwrap();
        assert_eq!(json, serde_json::json!({"address_id": 3, "partner_code": "P-1"}));
    }
}
