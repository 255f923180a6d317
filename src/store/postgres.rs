//! # PostgreSQL Migration Store
//!
//! [`MigrationStore`] over SQLx. Status columns hold the snake_case state
//! names. Compare-and-set updates use `WHERE status = ANY($n)` so a stale
//! writer affects zero rows; entity promotion locks the owning import row so
//! concurrent dispatchers cannot overshoot the ceiling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;

use super::{MigrationStore, PromotionOutcome};
use crate::config::DatabaseSettings;
use crate::error::{MigrationError, MigrationResult};
use crate::models::{
    Entity, EntityStatusSummary, Import, NewEntity, NewImport, NewTracker, SourceType, Tracker,
};
use crate::state_machine::{EntityState, ImportState, TrackerState};

const IMPORT_COLUMNS: &str = "id, status, source_version, created_at, updated_at";
const ENTITY_COLUMNS: &str =
    "id, bulk_import_id, source_type, source_full_path, status, created_at, updated_at";
const TRACKER_COLUMNS: &str =
    "id, bulk_import_entity_id, stage, relation, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgMigrationStore {
    pool: PgPool,
}

impl PgMigrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool using the database settings
    pub async fn connect(settings: &DatabaseSettings) -> MigrationResult<Self> {
        let url = settings.database_url().ok_or_else(|| {
            MigrationError::ConfigurationError(
                "database.url or DATABASE_URL is required".to_string(),
            )
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> MigrationResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_column<T>(raw: String, column: &str) -> MigrationResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| MigrationError::DatabaseError(format!("invalid {column} value: {e}")))
}

fn state_names<S: ToString>(states: &[S]) -> Vec<String> {
    states.iter().map(ToString::to_string).collect()
}

fn stage_to_column(stage: u32) -> MigrationResult<i32> {
    i32::try_from(stage)
        .map_err(|_| MigrationError::InvalidState(format!("stage {stage} exceeds column range")))
}

fn import_from_row(row: &PgRow) -> MigrationResult<Import> {
    Ok(Import {
        id: row.try_get("id")?,
        status: parse_column(row.try_get("status")?, "status")?,
        source_version: row.try_get("source_version")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn entity_from_row(row: &PgRow) -> MigrationResult<Entity> {
    Ok(Entity {
        id: row.try_get("id")?,
        import_id: row.try_get("bulk_import_id")?,
        source_type: parse_column::<SourceType>(row.try_get("source_type")?, "source_type")?,
        source_full_path: row.try_get("source_full_path")?,
        status: parse_column(row.try_get("status")?, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn tracker_from_row(row: &PgRow) -> MigrationResult<Tracker> {
    let stage: i32 = row.try_get("stage")?;
    Ok(Tracker {
        id: row.try_get("id")?,
        entity_id: row.try_get("bulk_import_entity_id")?,
        stage: u32::try_from(stage)
            .map_err(|_| MigrationError::DatabaseError(format!("negative stage {stage}")))?,
        relation: row.try_get("relation")?,
        status: parse_column(row.try_get("status")?, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl MigrationStore for PgMigrationStore {
    async fn create_import(&self, new_import: NewImport) -> MigrationResult<Import> {
        let row = sqlx::query(&format!(
            "INSERT INTO bulk_imports (status, source_version) VALUES ($1, $2) RETURNING {IMPORT_COLUMNS}"
        ))
        .bind(ImportState::Created.as_str())
        .bind(new_import.source_version)
        .fetch_one(&self.pool)
        .await?;

        import_from_row(&row)
    }

    async fn find_import(&self, import_id: i64) -> MigrationResult<Option<Import>> {
        let row = sqlx::query(&format!(
            "SELECT {IMPORT_COLUMNS} FROM bulk_imports WHERE id = $1"
        ))
        .bind(import_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(import_from_row).transpose()
    }

    async fn imports_with_status(&self, statuses: &[ImportState]) -> MigrationResult<Vec<Import>> {
        let rows = sqlx::query(&format!(
            "SELECT {IMPORT_COLUMNS} FROM bulk_imports WHERE status = ANY($1) ORDER BY created_at, id"
        ))
        .bind(state_names(statuses))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(import_from_row).collect()
    }

    async fn compare_and_set_import_status(
        &self,
        import_id: i64,
        allowed_from: &[ImportState],
        to: ImportState,
    ) -> MigrationResult<bool> {
        let result = sqlx::query(
            "UPDATE bulk_imports SET status = $1, updated_at = NOW() WHERE id = $2 AND status = ANY($3)",
        )
        .bind(to.as_str())
        .bind(import_id)
        .bind(state_names(allowed_from))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn create_entity(&self, new_entity: NewEntity) -> MigrationResult<Entity> {
        let row = sqlx::query(&format!(
            "INSERT INTO bulk_import_entities (bulk_import_id, source_type, source_full_path, status) \
             VALUES ($1, $2, $3, $4) RETURNING {ENTITY_COLUMNS}"
        ))
        .bind(new_entity.import_id)
        .bind(new_entity.source_type.as_str())
        .bind(new_entity.source_full_path)
        .bind(EntityState::Created.as_str())
        .fetch_one(&self.pool)
        .await?;

        entity_from_row(&row)
    }

    async fn find_entity(&self, entity_id: i64) -> MigrationResult<Option<Entity>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTITY_COLUMNS} FROM bulk_import_entities WHERE id = $1"
        ))
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(entity_from_row).transpose()
    }

    async fn entity_status_summary(&self, import_id: i64) -> MigrationResult<EntityStatusSummary> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM bulk_import_entities \
             WHERE bulk_import_id = $1 GROUP BY status",
        )
        .bind(import_id)
        .fetch_all(&self.pool)
        .await?;

        let mut summary = EntityStatusSummary::default();
        for row in rows {
            let status: EntityState = parse_column(row.try_get("status")?, "status")?;
            let count: i64 = row.try_get("count")?;
            let count = usize::try_from(count)
                .map_err(|_| MigrationError::DatabaseError(format!("invalid entity count {count}")))?;
            summary.add(status, count);
        }
        Ok(summary)
    }

    async fn created_entities(&self, import_id: i64, limit: usize) -> MigrationResult<Vec<Entity>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "SELECT {ENTITY_COLUMNS} FROM bulk_import_entities \
             WHERE bulk_import_id = $1 AND status = $2 ORDER BY id LIMIT $3"
        ))
        .bind(import_id)
        .bind(EntityState::Created.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entity_from_row).collect()
    }

    async fn started_entities(&self, import_id: i64) -> MigrationResult<Vec<Entity>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTITY_COLUMNS} FROM bulk_import_entities \
             WHERE bulk_import_id = $1 AND status = $2 ORDER BY id"
        ))
        .bind(import_id)
        .bind(EntityState::Started.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entity_from_row).collect()
    }

    async fn compare_and_set_entity_status(
        &self,
        entity_id: i64,
        allowed_from: &[EntityState],
        to: EntityState,
    ) -> MigrationResult<bool> {
        let result = sqlx::query(
            "UPDATE bulk_import_entities SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = ANY($3)",
        )
        .bind(to.as_str())
        .bind(entity_id)
        .bind(state_names(allowed_from))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn promote_entity(
        &self,
        entity_id: i64,
        ceiling: usize,
        trackers: Vec<NewTracker>,
    ) -> MigrationResult<PromotionOutcome> {
        let mut tx = self.pool.begin().await?;

        let owner = sqlx::query("SELECT bulk_import_id FROM bulk_import_entities WHERE id = $1")
            .bind(entity_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(owner) = owner else {
            tx.rollback().await?;
            return Ok(PromotionOutcome::NotClaimable(None));
        };
        let import_id: i64 = owner.try_get("bulk_import_id")?;

        // Serializes promotions per import so the started count cannot race.
        sqlx::query("SELECT id FROM bulk_imports WHERE id = $1 FOR UPDATE")
            .bind(import_id)
            .fetch_optional(&mut *tx)
            .await?;

        let started: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bulk_import_entities WHERE bulk_import_id = $1 AND status = $2",
        )
        .bind(import_id)
        .bind(EntityState::Started.as_str())
        .fetch_one(&mut *tx)
        .await?;

        if usize::try_from(started).unwrap_or(usize::MAX) >= ceiling {
            tx.rollback().await?;
            return Ok(PromotionOutcome::AtCapacity);
        }

        let claimed = sqlx::query(
            "UPDATE bulk_import_entities SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = $3",
        )
        .bind(EntityState::Started.as_str())
        .bind(entity_id)
        .bind(EntityState::Created.as_str())
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM bulk_import_entities WHERE id = $1")
                    .bind(entity_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            let current = current
                .map(|raw| parse_column::<EntityState>(raw, "status"))
                .transpose()?;
            return Ok(PromotionOutcome::NotClaimable(current));
        }

        let mut created = Vec::with_capacity(trackers.len());
        for new_tracker in trackers {
            let row = sqlx::query(&format!(
                "INSERT INTO bulk_import_trackers (bulk_import_entity_id, stage, relation, status) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (bulk_import_entity_id, relation) DO NOTHING \
                 RETURNING {TRACKER_COLUMNS}"
            ))
            .bind(entity_id)
            .bind(stage_to_column(new_tracker.stage)?)
            .bind(&new_tracker.relation)
            .bind(new_tracker.status.as_str())
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(row) = row {
                created.push(tracker_from_row(&row)?);
            }
        }

        tx.commit().await?;

        debug!(
            entity_id = entity_id,
            import_id = import_id,
            trackers = created.len(),
            "Entity promoted"
        );

        created.sort_by_key(|t| (t.stage, t.id));
        Ok(PromotionOutcome::Promoted(created))
    }

    async fn trackers_for_entity(&self, entity_id: i64) -> MigrationResult<Vec<Tracker>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRACKER_COLUMNS} FROM bulk_import_trackers \
             WHERE bulk_import_entity_id = $1 ORDER BY stage, id"
        ))
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(tracker_from_row).collect()
    }

    async fn find_tracker(&self, tracker_id: i64) -> MigrationResult<Option<Tracker>> {
        let row = sqlx::query(&format!(
            "SELECT {TRACKER_COLUMNS} FROM bulk_import_trackers WHERE id = $1"
        ))
        .bind(tracker_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(tracker_from_row).transpose()
    }

    async fn compare_and_set_tracker_status(
        &self,
        tracker_id: i64,
        allowed_from: &[TrackerState],
        to: TrackerState,
    ) -> MigrationResult<bool> {
        let result = sqlx::query(
            "UPDATE bulk_import_trackers SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = ANY($3)",
        )
        .bind(to.as_str())
        .bind(tracker_id)
        .bind(state_names(allowed_from))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
