//! PostgreSQL Report Registry

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{DomainPort, PortError};
use domain_ledger::{ContentHash, ReportArtifact, ReportRegistry, ReportRetention};

use super::rows::{convert_all, ArtifactRow};
use crate::error::DatabaseError;

const ARTIFACT_COLUMNS: &str = "hash, location, window_start, window_end, created_at";

/// Report index stored in the `report_artifact` table
#[derive(Debug, Clone)]
pub struct PostgresReportRegistry {
    pool: PgPool,
}

impl PostgresReportRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresReportRegistry {}

#[async_trait]
impl ReportRegistry for PostgresReportRegistry {
    #[instrument(skip_all, fields(hash = %artifact.hash, retention = ?retention))]
    async fn record(
        &self,
        artifact: &ReportArtifact,
        retention: ReportRetention,
    ) -> Result<Vec<ReportArtifact>, PortError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::transaction("begin", e))?;

        let evicted = match retention {
            ReportRetention::KeepHistory => Vec::new(),
            ReportRetention::SingleSlot => sqlx::query_as::<_, ArtifactRow>(&format!(
                "DELETE FROM report_artifact WHERE hash <> $1 RETURNING {}",
                ARTIFACT_COLUMNS
            ))
            .bind(artifact.hash.as_str())
            .fetch_all(&mut *tx)
            .await
            .map_err(DatabaseError::from)?,
        };

        sqlx::query(
            "INSERT INTO report_artifact (hash, location, window_start, window_end, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (hash) DO NOTHING",
        )
        .bind(artifact.hash.as_str())
        .bind(&artifact.location)
        .bind(artifact.window.start)
        .bind(artifact.window.end)
        .bind(artifact.created_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::transaction("commit", e))?;

        debug!(evicted = evicted.len(), "Report recorded");
        Ok(convert_all(evicted)?)
    }

    async fn lookup(&self, hash: &ContentHash) -> Result<Option<ReportArtifact>, PortError> {
        let row = sqlx::query_as::<_, ArtifactRow>(&format!(
            "SELECT {} FROM report_artifact WHERE hash = $1",
            ARTIFACT_COLUMNS
        ))
        .bind(hash.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(row.map(ReportArtifact::try_from).transpose()?)
    }
}
