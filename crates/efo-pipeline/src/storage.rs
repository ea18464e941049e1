// EFO Storage Layer
//
// Idempotent bulk persistence into PostgreSQL. Terms are upserted on their
// natural key; dependent rows (synonyms, relationships, cross-references)
// are written with ON CONFLICT DO NOTHING so re-running a load converges to
// the same state. Execution bookkeeping lives in pipeline_executions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use efo_common::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::models::{CrossReference, ExecutionStatus, PipelineStats, Relationship, RunMode, SynonymRow, Term};

/// Storage handler for EFO data
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connect to PostgreSQL
    ///
    /// The pool is capped at a single connection: the pipeline writes
    /// sequentially and phase 2 reads must observe phase 1 commits.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(database = %config.display(), "Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&config.url())
            .await?;

        Ok(PgStorage { pool })
    }

    /// Wrap an existing pool (used by integration tests)
    pub fn from_pool(pool: PgPool) -> Self {
        PgStorage { pool }
    }

    // ========================================================================
    // Terms
    // ========================================================================

    /// Upsert a batch of terms on their natural key
    ///
    /// Returns `(inserted, updated)`. The split relies on `xmax = 0` being
    /// true only for rows freshly inserted by this statement.
    pub async fn upsert_terms(&self, terms: &[Term]) -> Result<(usize, usize)> {
        if terms.is_empty() {
            return Ok((0, 0));
        }

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            INSERT INTO efo_terms (
                term_id,
                iri,
                label,
                description,
                content_hash
            )
            "#,
        );

        query_builder.push_values(terms, |mut b, term| {
            b.push_bind(&term.term_id)
                .push_bind(&term.iri)
                .push_bind(&term.label)
                .push_bind(&term.description)
                .push_bind(&term.content_hash);
        });

        query_builder.push(
            r#"
            ON CONFLICT (term_id)
            DO UPDATE SET
                iri = EXCLUDED.iri,
                label = EXCLUDED.label,
                description = EXCLUDED.description,
                content_hash = EXCLUDED.content_hash,
                updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        );

        let mut tx = self.pool.begin().await?;
        let rows = query_builder.build().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let inserted = rows
            .iter()
            .filter(|row| row.get::<bool, _>("inserted"))
            .count();
        let updated = rows.len() - inserted;

        debug!(inserted, updated, "Upserted terms batch");
        Ok((inserted, updated))
    }

    /// Map natural keys to internal ids for all stored terms
    pub async fn term_id_map(&self) -> Result<HashMap<String, i32>> {
        let rows = sqlx::query("SELECT term_id, id FROM efo_terms")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("term_id"), row.get("id")))
            .collect())
    }

    /// Map IRIs to internal ids for all stored terms
    pub async fn iri_to_id_map(&self) -> Result<HashMap<String, i32>> {
        let rows = sqlx::query("SELECT iri, id FROM efo_terms")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("iri"), row.get("id")))
            .collect())
    }

    /// Stored content hashes keyed by natural key, for incremental runs
    pub async fn stored_term_hashes(&self) -> Result<HashMap<String, String>> {
        let rows =
            sqlx::query("SELECT term_id, content_hash FROM efo_terms WHERE content_hash IS NOT NULL")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("term_id"), row.get("content_hash")))
            .collect())
    }

    // ========================================================================
    // Dependent Rows
    // ========================================================================

    /// Insert a batch of synonyms
    ///
    /// Rows whose owning term is absent from `term_id_map` are dropped and
    /// counted; returns `(inserted, dropped)`.
    pub async fn insert_synonyms(
        &self,
        rows: &[SynonymRow],
        term_id_map: &HashMap<String, i32>,
    ) -> Result<(usize, usize)> {
        let resolved: Vec<(i32, &str)> = rows
            .iter()
            .filter_map(|row| {
                term_id_map
                    .get(&row.term_id)
                    .map(|&id| (id, row.synonym.as_str()))
            })
            .collect();
        let dropped = rows.len() - resolved.len();

        if dropped > 0 {
            warn!(dropped, "Synonyms referencing unknown terms were dropped");
        }
        if resolved.is_empty() {
            return Ok((0, dropped));
        }

        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO efo_synonyms (term_id, synonym) ");

        query_builder.push_values(&resolved, |mut b, (term_id, synonym)| {
            b.push_bind(term_id).push_bind(synonym);
        });
        query_builder.push(" ON CONFLICT (term_id, synonym) DO NOTHING ");

        let mut tx = self.pool.begin().await?;
        query_builder.build().execute(&mut *tx).await?;
        tx.commit().await?;

        debug!(inserted = resolved.len(), dropped, "Inserted synonyms batch");
        Ok((resolved.len(), dropped))
    }

    /// Insert a batch of is-a relationships, already resolved to internal ids
    pub async fn insert_relationships(&self, relationships: &[Relationship]) -> Result<usize> {
        if relationships.is_empty() {
            return Ok(0);
        }

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO efo_relationships (child_id, parent_id, relationship_type) ",
        );

        query_builder.push_values(relationships, |mut b, rel| {
            b.push_bind(rel.child_id)
                .push_bind(rel.parent_id)
                .push_bind("is_a");
        });
        query_builder.push(" ON CONFLICT (child_id, parent_id) DO NOTHING ");

        let mut tx = self.pool.begin().await?;
        query_builder.build().execute(&mut *tx).await?;
        tx.commit().await?;

        debug!(inserted = relationships.len(), "Inserted relationships batch");
        Ok(relationships.len())
    }

    /// Insert a batch of cross-references
    ///
    /// Same resolution contract as synonyms: unresolvable rows are dropped
    /// and counted, never raised.
    pub async fn insert_xrefs(
        &self,
        rows: &[CrossReference],
        term_id_map: &HashMap<String, i32>,
    ) -> Result<(usize, usize)> {
        let resolved: Vec<(i32, &str, &str)> = rows
            .iter()
            .filter_map(|row| {
                term_id_map
                    .get(&row.term_id)
                    .map(|&id| (id, row.external_id.as_str(), row.database.as_str()))
            })
            .collect();
        let dropped = rows.len() - resolved.len();

        if dropped > 0 {
            warn!(dropped, "Cross-references referencing unknown terms were dropped");
        }
        if resolved.is_empty() {
            return Ok((0, dropped));
        }

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO mesh_cross_references (term_id, mesh_id, database) ",
        );

        query_builder.push_values(&resolved, |mut b, (term_id, mesh_id, database)| {
            b.push_bind(term_id).push_bind(mesh_id).push_bind(database);
        });
        query_builder.push(" ON CONFLICT (term_id, mesh_id) DO NOTHING ");

        let mut tx = self.pool.begin().await?;
        query_builder.build().execute(&mut *tx).await?;
        tx.commit().await?;

        debug!(inserted = resolved.len(), dropped, "Inserted cross-references batch");
        Ok((resolved.len(), dropped))
    }

    // ========================================================================
    // Execution Bookkeeping
    // ========================================================================

    /// Open a new execution record in `running` state
    pub async fn create_execution(&self, mode: RunMode) -> Result<i32> {
        let execution_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO pipeline_executions (started_at, execution_mode, status)
            VALUES (NOW(), $1, $2)
            RETURNING execution_id
            "#,
        )
        .bind(mode.as_str())
        .bind(ExecutionStatus::Running.as_str())
        .fetch_one(&self.pool)
        .await?;

        info!(execution_id, mode = %mode, "Created execution record");
        Ok(execution_id)
    }

    /// Finalize an execution record with its terminal status and counters
    pub async fn finish_execution(
        &self,
        execution_id: i32,
        status: ExecutionStatus,
        stats: &PipelineStats,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE pipeline_executions
            SET completed_at = NOW(),
                status = $2,
                terms_fetched = $3,
                terms_inserted = $4,
                terms_updated = $5,
                terms_skipped = $6,
                error_message = $7
            WHERE execution_id = $1
            "#,
        )
        .bind(execution_id)
        .bind(status.as_str())
        .bind(stats.terms_fetched as i32)
        .bind(stats.terms_inserted as i32)
        .bind(stats.terms_updated as i32)
        .bind(stats.terms_skipped as i32)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        info!(execution_id, status = %status, "Finalized execution record");
        Ok(())
    }

    /// Completion time of the most recent successful run in the given mode
    pub async fn last_successful_execution(
        &self,
        mode: RunMode,
    ) -> Result<Option<DateTime<Utc>>> {
        let completed_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT MAX(completed_at)
            FROM pipeline_executions
            WHERE status = $1
              AND execution_mode = $2
            "#,
        )
        .bind(ExecutionStatus::Success.as_str())
        .bind(mode.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(completed_at)
    }
}
