//! Database schema management for `waterwatch`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` when the postgres store is selected.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `water_readings` table and the indexes backing the store's
/// existence checks and latest-by-time lookup. Safe to call on every
/// startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS water_readings (
            id                UUID PRIMARY KEY,
            object_id         BIGINT,
            recorded_at       TIMESTAMPTZ,
            timestamp_source  TEXT NOT NULL DEFAULT 'pipeline',
            ph                DOUBLE PRECISION,
            alkalinity_mgl    DOUBLE PRECISION,
            conductivity_uscm DOUBLE PRECISION,
            bod_mgl           DOUBLE PRECISION,
            nitrite_mgl       DOUBLE PRECISION,
            copper1_mgl       DOUBLE PRECISION,
            copper2_ugl       DOUBLE PRECISION,
            iron_ugl          DOUBLE PRECISION,
            zinc_ugl          DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Degraded dedup lookups
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_water_readings_object_id
            ON water_readings (object_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Natural-key lookups
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_water_readings_natural_key
            ON water_readings (object_id, recorded_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_water_readings_recorded_at
            ON water_readings (recorded_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
