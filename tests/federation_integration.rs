//! Integration tests against a live Postgres
//!
//! Requires: DATABASE_URL (or TEST_DATABASE_URL). Run with
//! `cargo test --test federation_integration -- --ignored`.

mod helpers;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::Barrier;

use helpers::TestDb;
use sales_federation::database::locks::{advisory_xact_lock, lock_key, try_advisory_xact_lock};
use sales_federation::database::EntityKind;
use sales_federation::model::{
    Address, Article, Branch, NewBranch, NewPartner, NewSalesOrder, NewSalesperson, Partner,
    SaleLine, SalesOrder, Salesperson,
};
use sales_federation::reports::{GroupSales, RegionQuantity};
use sales_federation::{DataAccessError, ReportFilter, SalesFederation, SalesPort, Shard};

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn partner(code: &str, city: &str) -> NewPartner {
    NewPartner {
        partner: Partner {
            partner_code: code.into(),
            partner_name: format!("Partner {code}"),
            tax_id: format!("RO{code}"),
            email: format!("{code}@example.com"),
            address_id: 0,
        },
        address: Some(Address {
            city: city.into(),
            ..Default::default()
        }),
    }
}

fn line(article: &str, quantity: i64, price: i64) -> SaleLine {
    SaleLine {
        article_code: article.into(),
        quantity: Decimal::from(quantity),
        price: Decimal::from(price),
        ..Default::default()
    }
}

fn order(salesperson: i32, lines: Vec<SaleLine>) -> NewSalesOrder {
    NewSalesOrder {
        order: SalesOrder {
            partner_code: "P1".into(),
            order_date: date(2021, 3, 1),
            delivery_date: date(2021, 3, 4),
            total: Decimal::from(100),
            vat: Decimal::from(19),
            discount: Decimal::from(5),
            amount_paid: Decimal::from(95),
            salesperson_code: salesperson,
            branch_id: 1,
            ..Default::default()
        },
        lines,
    }
}

/// Groups Food(1)/Tools(2), units kg(1)/pcs(2), articles A1 (Food, kg) and A2 (Tools, pcs)
async fn seed_catalog(db: &TestDb, sales: &SalesFederation, shard: Shard) {
    for (code, name) in [(1, "Food"), (2, "Tools")] {
        sqlx::query(&format!(
            "INSERT INTO {} (group_code, group_name) VALUES ($1, $2)",
            EntityKind::ArticleGroup.table(shard)
        ))
        .bind(code)
        .bind(name)
        .execute(&db.pool)
        .await
        .unwrap();
    }
    for (id, name) in [(1, "kg"), (2, "pcs")] {
        sqlx::query(&format!(
            "INSERT INTO {} (unit_id, unit_name) VALUES ($1, $2)",
            EntityKind::UnitOfMeasure.table(shard)
        ))
        .bind(id)
        .bind(name)
        .execute(&db.pool)
        .await
        .unwrap();
    }
    for (code, group, unit) in [("A1", 1, 1), ("A2", 2, 2)] {
        sales
            .insert_article(
                shard,
                Article {
                    article_code: code.into(),
                    article_name: format!("Article {code}"),
                    group_code: group,
                    stock_quantity: 10,
                    unit_id: unit,
                },
            )
            .await
            .unwrap();
    }
}

fn branch(region: &str) -> NewBranch {
    NewBranch {
        branch: Branch {
            branch_name: format!("Branch {region}"),
            ..Default::default()
        },
        address: Some(Address {
            region: region.into(),
            ..Default::default()
        }),
    }
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn shards_answer_ping() {
    let db = TestDb::new().await;
    db.registry.global().ping().await.unwrap();
    db.federation().ping(Shard::Local4).await.unwrap();
    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn inline_address_ids_increase() {
    let db = TestDb::new().await;
    let sales = db.federation();

    let first = sales
        .insert_partner(Shard::Global, partner("P1", "Cluj"))
        .await
        .unwrap();
    let second = sales
        .insert_partner(Shard::Global, partner("P2", "Iasi"))
        .await
        .unwrap();

    assert_eq!(first.address_id, Some(1));
    assert!(second.address_id > first.address_id);

    let partners = sales.partners(Shard::Global).await.unwrap();
    assert_eq!(partners.len(), 2);
    assert_eq!(partners[0].address_id, 1);

    let addresses = sales.addresses(Shard::Global).await.unwrap();
    assert_eq!(addresses[0].city, "Cluj");

    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn order_lines_are_numbered_from_one() {
    let db = TestDb::new().await;
    let sales = db.federation();

    let keys = sales
        .insert_sales_order(
            Shard::Local2,
            order(7, vec![line("A1", 2, 10), line("A2", 1, 5), line("A3", 4, 1)]),
        )
        .await
        .unwrap();
    assert_eq!(keys.order_id, Some(1));
    assert_eq!(keys.line_numbers, vec![1, 2, 3]);

    let lines = sales.sale_lines(Shard::Local2, 1).await.unwrap();
    let articles: Vec<_> = lines.iter().map(|l| l.article_code.as_str()).collect();
    assert_eq!(articles, vec!["A1", "A2", "A3"]);

    // Other shards are untouched
    assert!(sales.sales_orders(Shard::Global).await.unwrap().is_empty());

    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn local_partner_reads_zero_fill_missing_columns() {
    let db = TestDb::new().await;
    let sales = db.federation();

    sales
        .insert_partner(Shard::Local4, partner("P9", "Brasov"))
        .await
        .unwrap();

    let partners = sales.partners(Shard::Local4).await.unwrap();
    assert_eq!(partners.len(), 1);
    assert_eq!(partners[0].partner_code, "P9");
    assert_eq!(partners[0].partner_name, "");
    assert_eq!(partners[0].tax_id, "");
    assert_eq!(partners[0].address_id, 1);

    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn concurrent_inserts_get_distinct_keys() {
    let db = TestDb::new().await;
    let barrier = Arc::new(Barrier::new(8));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let sales = db.federation();
        let barrier = barrier.clone();
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            sales
                .insert_salesperson(
                    Shard::Global,
                    NewSalesperson {
                        salesperson: Salesperson {
                            last_name: format!("Seller {i}"),
                            ..Default::default()
                        },
                        address: Some(Address::default()),
                    },
                )
                .await
        }));
    }

    let mut codes = HashSet::new();
    let mut addresses = HashSet::new();
    for task in tasks {
        let keys = task.await.unwrap().unwrap();
        codes.insert(keys.salesperson_code.unwrap());
        addresses.insert(keys.address_id.unwrap());
    }
    assert_eq!(codes.len(), 8);
    assert_eq!(addresses.len(), 8);

    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn failed_stage_rolls_back_earlier_stages() {
    let db = TestDb::new().await;
    let sales = db.federation();

    sales
        .insert_partner(Shard::Global, partner("P1", "Cluj"))
        .await
        .unwrap();
    let err = sales
        .insert_partner(Shard::Global, partner("P1", "Arad"))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 409);

    let addresses = sales.addresses(Shard::Global).await.unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0].city, "Cluj");

    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn branch_ids_come_from_global() {
    let db = TestDb::new().await;
    let sales = db.federation();

    let keys = sales
        .insert_branch(
            Shard::Local1,
            NewBranch {
                branch: Branch {
                    branch_name: "Sibiu".into(),
                    ..Default::default()
                },
                address: Some(Address {
                    city: "Sibiu".into(),
                    ..Default::default()
                }),
            },
        )
        .await
        .unwrap();
    let branch_id = keys.branch_id.unwrap();

    let local = sales.branches(Shard::Local1).await.unwrap();
    let global = sales.branches(Shard::Global).await.unwrap();
    assert_eq!(local[0].branch_id, branch_id);
    assert_eq!(global[0].branch_id, branch_id);
    assert_eq!(global[0].address_id, keys.address_id.unwrap());

    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn sale_line_edits_report_missing_rows() {
    let db = TestDb::new().await;
    let sales = db.federation();

    sales
        .insert_sales_order(Shard::Global, order(7, vec![line("A1", 2, 10)]))
        .await
        .unwrap();

    let appended = sales
        .insert_sale_line(
            Shard::Global,
            SaleLine {
                order_id: 1,
                ..line("A2", 3, 4)
            },
        )
        .await
        .unwrap();
    assert_eq!(appended.line_numbers, vec![2]);

    let err = sales
        .insert_sale_line(
            Shard::Global,
            SaleLine {
                order_id: 99,
                ..line("A2", 1, 1)
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DataAccessError::NotFound { .. }));

    sales
        .update_sale_line(Shard::Global, 1, 1, line("A1", 5, 10))
        .await
        .unwrap();
    let lines = sales.sale_lines(Shard::Global, 1).await.unwrap();
    assert_eq!(lines[0].quantity, Decimal::from(5));

    sales.delete_sale_line(Shard::Global, 1, 2).await.unwrap();
    let err = sales.delete_sale_line(Shard::Global, 1, 2).await.unwrap_err();
    assert!(matches!(err, DataAccessError::NotFound { .. }));
    let err = sales
        .update_sale_line(Shard::Global, 1, 2, line("A2", 1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, DataAccessError::NotFound { .. }));

    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn form_reports_respect_filters() {
    let db = TestDb::new().await;
    let sales = db.federation();

    sales
        .insert_sales_order(Shard::Global, order(7, vec![line("A1", 2, 10), line("A2", 1, 5)]))
        .await
        .unwrap();
    sales
        .insert_sales_order(Shard::Global, order(8, vec![line("A1", 1, 3)]))
        .await
        .unwrap();

    let filter = ReportFilter {
        salesperson_code: Some(7),
        ..Default::default()
    };
    let rows = sales.form_report(Shard::Global, filter.clone()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].transactions, Decimal::from(2));
    assert_eq!(rows[0].quantity, Decimal::from(3));

    let grouped = sales.grouped_form_report(Shard::Global, filter).await.unwrap();
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].transactions, Decimal::from(2));
    assert_eq!(grouped[1].transactions, Decimal::from(2));

    // Outside the date window nothing matches
    let rows = sales
        .form_report(
            Shard::Global,
            ReportFilter::date_range(date(2022, 1, 1), date(2022, 12, 31)),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());

    // Local2 cannot filter on partner names
    let rows = sales
        .form_report(
            Shard::Local2,
            ReportFilter {
                partner_name: Some("Partner P1".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(rows.is_empty());

    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn weekday_volumes_start_on_delivery_day() {
    let db = TestDb::new().await;
    let sales = db.federation();

    // 2021-03-04 was a Thursday
    sales
        .insert_sales_order(Shard::Global, order(7, vec![line("A1", 2, 10), line("A2", 4, 5)]))
        .await
        .unwrap();

    let volumes = sales
        .weekday_volumes(Shard::Global, ReportFilter::default())
        .await
        .unwrap();
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0].iso_day, 4);
    assert_eq!(volumes[0].weekday, "THU");
    assert_eq!(volumes[0].average_quantity, Decimal::from(6));

    let quarters = sales.quarter_discounts(Shard::Global).await.unwrap();
    assert_eq!(quarters[0].quarter, "2021-q1");
    assert_eq!(quarters[0].discount_percent, Decimal::from(5));

    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn advisory_lock_blocks_second_session() {
    let db = TestDb::new().await;
    let key = lock_key("\"Addresses\"", "address_id");

    let mut tx = db.pool.begin().await.unwrap();
    advisory_xact_lock(&mut tx, key).await.unwrap();

    let mut other = db.pool.begin().await.unwrap();
    assert!(!try_advisory_xact_lock(&mut other, key).await.unwrap());
    other.rollback().await.unwrap();

    tx.commit().await.unwrap();
    let mut after = db.pool.begin().await.unwrap();
    assert!(try_advisory_xact_lock(&mut after, key).await.unwrap());
    after.rollback().await.unwrap();

    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn group_and_region_reports_over_real_rows() {
    let db = TestDb::new().await;
    let sales = db.federation();
    seed_catalog(&db, &sales, Shard::Global).await;

    let keys = sales.insert_branch(Shard::Global, branch("CJ")).await.unwrap();
    assert_eq!(keys.branch_id, Some(1));

    sales
        .insert_sales_order(Shard::Global, order(7, vec![line("A1", 2, 10)]))
        .await
        .unwrap();
    sales
        .insert_sales_order(Shard::Global, order(7, vec![line("A1", 1, 3), line("A2", 4, 2)]))
        .await
        .unwrap();

    // amount_paid (95) counts once per matching line
    let groups = sales.group_sales(Shard::Global).await.unwrap();
    assert_eq!(
        groups,
        vec![
            GroupSales {
                group_name: "Food".into(),
                total_sales: Decimal::from(190),
            },
            GroupSales {
                group_name: "Tools".into(),
                total_sales: Decimal::from(95),
            },
        ]
    );

    let regions = sales.region_quantities(Shard::Global).await.unwrap();
    assert_eq!(
        regions,
        vec![
            RegionQuantity {
                region: "CJ".into(),
                unit_name: "kg".into(),
                average_quantity: Decimal::new(15, 1),
            },
            RegionQuantity {
                region: "CJ".into(),
                unit_name: "pcs".into(),
                average_quantity: Decimal::from(4),
            },
        ]
    );

    db.cleanup().await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn local_region_comes_from_global_branch_address() {
    let db = TestDb::new().await;
    let sales = db.federation();
    seed_catalog(&db, &sales, Shard::Local3).await;

    // Local address 1 belongs to the partner; global address 1 to the branch
    sales
        .insert_partner(
            Shard::Local3,
            NewPartner {
                address: Some(Address {
                    region: "BV".into(),
                    ..Default::default()
                }),
                ..partner("P1", "Brasov")
            },
        )
        .await
        .unwrap();
    let keys = sales.insert_branch(Shard::Local3, branch("CJ")).await.unwrap();
    assert_eq!(keys.address_id, Some(1));
    assert_eq!(keys.branch_id, Some(1));

    sales
        .insert_sales_order(Shard::Local3, order(7, vec![line("A1", 2, 10)]))
        .await
        .unwrap();

    let regions = sales.region_quantities(Shard::Local3).await.unwrap();
    assert_eq!(
        regions,
        vec![RegionQuantity {
            region: "CJ".into(),
            unit_name: "kg".into(),
            average_quantity: Decimal::from(2),
        }]
    );

    db.cleanup().await;
}
