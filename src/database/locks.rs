//! Transaction-scoped advisory locks
//!
//! Key allocation takes one of these before scanning for the current maximum,
//! so concurrent writers against the same table and scope serialize. Locks are
//! released when the transaction commits or rolls back.

use sha2::{Digest, Sha256};
use sqlx::{PgConnection, Row};

/// Stable 64-bit lock key for `(namespace, id)`
pub fn lock_key(namespace: &str, id: &str) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update([0u8]);
    hasher.update(id.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// Block until the lock is held by this transaction
pub async fn advisory_xact_lock(conn: &mut PgConnection, key: i64) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(conn)
        .await?;
    Ok(())
}

/// Take the lock if it is free; `false` when another transaction holds it
pub async fn try_advisory_xact_lock(
    conn: &mut PgConnection,
    key: i64,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT pg_try_advisory_xact_lock($1) AS acquired")
        .bind(key)
        .fetch_one(conn)
        .await?;
    row.try_get("acquired")
}
