//! Table-driven entity reads and writes
//!
//! One generic read and one generic insert serve every shard × entity pair;
//! the column list always comes from [`project`].

use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;
use sqlx::{PgConnection, QueryBuilder};
use tracing::{debug, info};

use crate::database::projection::{
    project, Canonical, ColumnDef, ColumnSet, ColumnType, EntityKind, FieldValue, PartialRow,
};
use crate::database::registry::ShardHandle;
use crate::error::{DataAccessError, Result};
use crate::model::SaleLine;

/// Read every row of `T` the shard holds, ordered by key
pub async fn fetch_all<T: Canonical>(handle: &ShardHandle) -> Result<Vec<T>> {
    let kind = T::KIND;
    let set = project(handle.shard(), kind);

    let mut sql = format!(
        "SELECT {} FROM {} ORDER BY {}",
        set.select_list(),
        handle.table(kind),
        kind.key_columns().join(", ")
    );
    if let Some(cap) = kind.row_cap() {
        sql.push_str(&format!(" LIMIT {}", cap));
    }
    debug!(shard = %handle.shard(), entity = %kind, "{}", sql);

    let rows = sqlx::query(&sql)
        .fetch_all(handle.pool())
        .await
        .map_err(|e| handle.error(e))?;

    rows.iter()
        .map(|row| PartialRow::decode(row, &set).and_then(|partial| T::from_partial(&partial)))
        .collect()
}

/// Lines of one order, ordered by line number
pub async fn fetch_sale_lines(handle: &ShardHandle, order_id: i32) -> Result<Vec<SaleLine>> {
    let set = project(handle.shard(), EntityKind::SaleLine);
    let sql = format!(
        "SELECT {} FROM {} WHERE order_id = $1 ORDER BY line_number",
        set.select_list(),
        handle.table(EntityKind::SaleLine)
    );

    let rows = sqlx::query(&sql)
        .bind(order_id)
        .fetch_all(handle.pool())
        .await
        .map_err(|e| handle.error(e))?;

    rows.iter()
        .map(|row| PartialRow::decode(row, &set).and_then(|p| SaleLine::from_partial(&p)))
        .collect()
}

/// `INSERT` of the columns `set` materializes, values bound from `row`
pub fn insert_statement<'args>(
    table: &str,
    set: &ColumnSet,
    row: &PartialRow,
) -> QueryBuilder<'args, Postgres> {
    let names: Vec<&str> = set.names().collect();
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) VALUES (",
        table,
        names.join(", ")
    ));

    {
        let mut values = builder.separated(", ");
        for (column, value) in set.columns().iter().zip(row.values_for(set)) {
            bind_value(&mut values, column, value);
        }
    }
    builder.push(")");
    builder
}

pub async fn insert_row(
    conn: &mut PgConnection,
    table: &str,
    set: &ColumnSet,
    row: &PartialRow,
) -> std::result::Result<(), sqlx::Error> {
    let mut builder = insert_statement(table, set, row);
    debug!(table, "{}", builder.sql());
    builder.build().execute(conn).await?;
    Ok(())
}

/// Whether an order header exists on this connection's shard
pub async fn order_exists(
    conn: &mut PgConnection,
    table: &str,
    order_id: i32,
) -> std::result::Result<bool, sqlx::Error> {
    let sql = format!("SELECT 1 FROM {} WHERE order_id = $1", table);
    let found = sqlx::query(&sql)
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// Overwrite a sale line addressed by `(order_id, line_number)`
///
/// Key columns in `line` are ignored; only the addressed row changes.
pub async fn update_sale_line(
    handle: &ShardHandle,
    order_id: i32,
    line_number: i32,
    line: &SaleLine,
) -> Result<()> {
    line.validate()?;
    let kind = EntityKind::SaleLine;
    let set = project(handle.shard(), kind);
    let values = line.to_partial();

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("UPDATE {} SET ", handle.table(kind)));
    {
        let mut assignments = builder.separated(", ");
        for column in set.columns() {
            if kind.key_columns().contains(&column.name) {
                continue;
            }
            assignments.push(format!("{} = ", column.name));
            let value = values.get(column.name).cloned().unwrap_or(FieldValue::Null);
            bind_value_unseparated(&mut assignments, column, value);
        }
    }
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id);
    builder.push(" AND line_number = ");
    builder.push_bind(line_number);

    let result = builder
        .build()
        .execute(handle.pool())
        .await
        .map_err(|e| handle.error(e))?;

    if result.rows_affected() == 0 {
        return Err(sale_line_not_found(order_id, line_number));
    }
    info!(shard = %handle.shard(), order_id, line_number, "Sale line updated");
    Ok(())
}

pub async fn delete_sale_line(handle: &ShardHandle, order_id: i32, line_number: i32) -> Result<()> {
    let sql = format!(
        "DELETE FROM {} WHERE order_id = $1 AND line_number = $2",
        handle.table(EntityKind::SaleLine)
    );
    let result = sqlx::query(&sql)
        .bind(order_id)
        .bind(line_number)
        .execute(handle.pool())
        .await
        .map_err(|e| handle.error(e))?;

    if result.rows_affected() == 0 {
        return Err(sale_line_not_found(order_id, line_number));
    }
    info!(shard = %handle.shard(), order_id, line_number, "Sale line deleted");
    Ok(())
}

fn sale_line_not_found(order_id: i32, line_number: i32) -> DataAccessError {
    DataAccessError::NotFound {
        entity: EntityKind::SaleLine.label(),
        key: format!("{}/{}", order_id, line_number),
    }
}

fn bind_value(values: &mut Separated<'_, '_, Postgres, &'static str>, column: &ColumnDef, value: FieldValue) {
    match value {
        FieldValue::Text(v) => values.push_bind(v),
        FieldValue::Int(v) => values.push_bind(v),
        FieldValue::Numeric(v) => values.push_bind(v),
        FieldValue::Date(v) => values.push_bind(v),
        FieldValue::Bool(v) => values.push_bind(v),
        // NULL still needs the column's type so Postgres accepts it
        FieldValue::Null => match column.ty {
            ColumnType::Text => values.push_bind(None::<String>),
            ColumnType::Int => values.push_bind(None::<i32>),
            ColumnType::Numeric => values.push_bind(None::<rust_decimal::Decimal>),
            ColumnType::Date => values.push_bind(None::<chrono::NaiveDate>),
            ColumnType::Bool => values.push_bind(None::<bool>),
        },
    };
}

fn bind_value_unseparated(
    values: &mut Separated<'_, '_, Postgres, &'static str>,
    column: &ColumnDef,
    value: FieldValue,
) {
    match value {
        FieldValue::Text(v) => values.push_bind_unseparated(v),
        FieldValue::Int(v) => values.push_bind_unseparated(v),
        FieldValue::Numeric(v) => values.push_bind_unseparated(v),
        FieldValue::Date(v) => values.push_bind_unseparated(v),
        FieldValue::Bool(v) => values.push_bind_unseparated(v),
        FieldValue::Null => match column.ty {
            ColumnType::Text => values.push_bind_unseparated(None::<String>),
            ColumnType::Int => values.push_bind_unseparated(None::<i32>),
            ColumnType::Numeric => values.push_bind_unseparated(None::<rust_decimal::Decimal>),
            ColumnType::Date => values.push_bind_unseparated(None::<chrono::NaiveDate>),
            ColumnType::Bool => values.push_bind_unseparated(None::<bool>),
        },
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Partner;
    use crate::shard::Shard;

    #[test]
    fn insert_binds_only_projected_columns() {
        let set = project(Shard::Local2, EntityKind::Partner);
        let row = Partner {
            partner_code: "P-7".into(),
            partner_name: "Dropped".into(),
            tax_id: "RO77".into(),
            email: "dropped@example.ro".into(),
            address_id: 3,
        }
        .to_partial();

        let builder = insert_statement(&EntityKind::Partner.table(Shard::Local2), &set, &row);
        assert_eq!(
            builder.sql(),
            "INSERT INTO \"Partners_S2\" (partner_code, tax_id, address_id) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn missing_values_bind_as_typed_nulls() {
        let set = project(Shard::Global, EntityKind::SaleLine);
        let row = PartialRow::new().with("order_id", 1).with("line_number", 1);
        let builder = insert_statement(&EntityKind::SaleLine.table(Shard::Global), &set, &row);
        assert!(builder.sql().ends_with("VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"));
    }
}
