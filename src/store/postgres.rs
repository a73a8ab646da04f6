use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::ReadingStore;
use crate::{
    errors::StoreError,
    models::{Measurements, Reading, TimestampSource},
};

// ---

const SELECT_COLUMNS: &str = r#"
    SELECT id, object_id, recorded_at, timestamp_source,
           ph, alkalinity_mgl, conductivity_uscm, bod_mgl, nitrite_mgl,
           copper1_mgl, copper2_ugl, iron_ugl, zinc_ugl
    FROM water_readings
"#;

/// `water_readings` table backed store. Schema is created by
/// [`crate::schema::create_schema`].
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReadingRow {
    // ---
    id: Uuid,
    object_id: Option<i64>,
    recorded_at: Option<DateTime<Utc>>,
    timestamp_source: String,
    ph: Option<f64>,
    alkalinity_mgl: Option<f64>,
    conductivity_uscm: Option<f64>,
    bod_mgl: Option<f64>,
    nitrite_mgl: Option<f64>,
    copper1_mgl: Option<f64>,
    copper2_ugl: Option<f64>,
    iron_ugl: Option<f64>,
    zinc_ugl: Option<f64>,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        // ---
        Reading {
            id: Some(row.id),
            object_id: row.object_id,
            timestamp: row.recorded_at,
            timestamp_source: TimestampSource::from_column(&row.timestamp_source),
            measurements: Measurements {
                ph: row.ph,
                alkalinity_mgl: row.alkalinity_mgl,
                conductivity_uscm: row.conductivity_uscm,
                bod_mgl: row.bod_mgl,
                nitrite_mgl: row.nitrite_mgl,
                copper1_mgl: row.copper1_mgl,
                copper2_ugl: row.copper2_ugl,
                iron_ugl: row.iron_ugl,
                zinc_ugl: row.zinc_ugl,
            },
        }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn save(&self, mut reading: Reading) -> Result<Reading, StoreError> {
        // ---
        let id = Uuid::new_v4();
        let m = &reading.measurements;

        sqlx::query(
            r#"
            INSERT INTO water_readings (
                id, object_id, recorded_at, timestamp_source,
                ph, alkalinity_mgl, conductivity_uscm, bod_mgl, nitrite_mgl,
                copper1_mgl, copper2_ugl, iron_ugl, zinc_ugl
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(id)
        .bind(reading.object_id)
        .bind(reading.timestamp)
        .bind(reading.timestamp_source.as_str())
        .bind(m.ph)
        .bind(m.alkalinity_mgl)
        .bind(m.conductivity_uscm)
        .bind(m.bod_mgl)
        .bind(m.nitrite_mgl)
        .bind(m.copper1_mgl)
        .bind(m.copper2_ugl)
        .bind(m.iron_ugl)
        .bind(m.zinc_ugl)
        .execute(&self.pool)
        .await?;

        reading.id = Some(id);
        Ok(reading)
    }

    async fn exists_by_object_id(&self, object_id: i64) -> Result<bool, StoreError> {
        // ---
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM water_readings WHERE object_id = $1)",
        )
        .bind(object_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn exists_by_object_id_and_timestamp(
        &self,
        object_id: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // ---
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM water_readings
                WHERE object_id = $1 AND recorded_at = $2
            )
            "#,
        )
        .bind(object_id)
        .bind(timestamp)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn find_all(&self) -> Result<Vec<Reading>, StoreError> {
        // ---
        let sql = format!("{SELECT_COLUMNS} ORDER BY recorded_at ASC NULLS FIRST");
        let rows = sqlx::query_as::<_, ReadingRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Reading::from).collect())
    }

    async fn find_latest_by_timestamp(&self) -> Result<Option<Reading>, StoreError> {
        // ---
        let sql = format!("{SELECT_COLUMNS} ORDER BY recorded_at DESC NULLS LAST LIMIT 1");
        let row = sqlx::query_as::<_, ReadingRow>(&sql)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Reading::from))
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        // ---
        let result = sqlx::query("DELETE FROM water_readings")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
