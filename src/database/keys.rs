//! Surrogate key allocation
//!
//! Keys are `max(existing) + 1` with a floor of 0, so the first key is 1.
//! Allocation must run inside the transaction that inserts the row; the
//! advisory lock is held until that transaction ends.

use sqlx::{PgConnection, Row};
use tracing::debug;

use crate::database::locks::{advisory_xact_lock, lock_key};

/// Narrows a max-scan to rows sharing one parent key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyScope {
    pub column: &'static str,
    pub value: i32,
}

/// Allocate the next integer key for `column` of `table`
///
/// `table` must already be a quoted identifier.
pub async fn next_key(
    conn: &mut PgConnection,
    table: &str,
    column: &'static str,
    scope: Option<KeyScope>,
) -> Result<i32, sqlx::Error> {
    let lock_id = match scope {
        Some(s) => format!("{}:{}={}", column, s.column, s.value),
        None => column.to_string(),
    };
    advisory_xact_lock(&mut *conn, lock_key(table, &lock_id)).await?;

    let next: i32 = match scope {
        Some(s) => {
            let sql = format!(
                "SELECT COALESCE(MAX({}), 0) + 1 AS next FROM {} WHERE {} = $1",
                column, table, s.column
            );
            sqlx::query(&sql)
                .bind(s.value)
                .fetch_one(&mut *conn)
                .await?
                .try_get("next")?
        }
        None => {
            let sql = format!(
                "SELECT COALESCE(MAX({}), 0) + 1 AS next FROM {}",
                column, table
            );
            sqlx::query(&sql).fetch_one(&mut *conn).await?.try_get("next")?
        }
    };

    debug!(table, column, next, "Allocated surrogate key");
    Ok(next)
}
