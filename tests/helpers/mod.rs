//! Throwaway federation for integration tests
//!
//! All five shards share one pool whose connections are pinned to a fresh
//! schema. Table suffixes keep the shards apart inside that schema.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use sales_federation::{SalesFederation, Shard, ShardRegistry};

pub struct TestDb {
    pub pool: PgPool,
    pub schema: String,
    pub registry: ShardRegistry,
}

impl TestDb {
    pub async fn new() -> Self {
        let url = std::env::var("TEST_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("DATABASE_URL must be set for integration tests");
        let schema = format!("sales_test_{}", Uuid::new_v4().simple());

        let admin = PgPool::connect(&url)
            .await
            .expect("Failed to connect to test database");
        admin
            .execute(format!("CREATE SCHEMA \"{}\"", schema).as_str())
            .await
            .expect("Failed to create test schema");
        admin.close().await;

        let search_path = schema.clone();
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .after_connect(move |conn, _meta| {
                let statement = format!("SET search_path TO \"{}\"", search_path);
                Box::pin(async move {
                    conn.execute(statement.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .expect("Failed to open test pool");

        let registry = ShardRegistry::from_pools(
            Shard::ALL.into_iter().map(|shard| (shard, pool.clone())),
            Duration::from_secs(5),
        )
        .expect("Failed to build registry");
        registry
            .install_schema()
            .await
            .expect("Failed to install schema");

        Self {
            pool,
            schema,
            registry,
        }
    }

    pub fn federation(&self) -> SalesFederation {
        SalesFederation::new(self.registry.clone())
    }

    pub async fn cleanup(self) {
        let _ = self
            .pool
            .execute(format!("DROP SCHEMA \"{}\" CASCADE", self.schema).as_str())
            .await;
        self.pool.close().await;
    }
}
