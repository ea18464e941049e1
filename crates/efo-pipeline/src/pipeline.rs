// EFO Pipeline Orchestrator
//
// Drives the full retrieval-transform-load cycle:
//
// Phase 1: stream terms from the OLS API, normalize and hash them, and
//          upsert them in batches (skipping unchanged terms in incremental
//          mode). Parents are not known yet, so the stored hash covers the
//          term fields and synonyms only.
// Phase 1.5: batch-resolve parent links with bounded concurrency.
// Phase 2: re-read the id mappings and load synonyms, is-a relationships
//          and MeSH cross-references against the committed terms.
//
// Every run gets a pipeline_executions record that is finalized on success,
// failure, and interruption alike.

use std::collections::HashMap;

use efo_common::{PipelineError, Result};
use futures::{pin_mut, StreamExt};
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::models::{
    CrossReference, ExecutionStatus, PipelineStats, Relationship, RunMode, SynonymRow, Term,
};
use crate::ols::OlsClient;
use crate::storage::PgStorage;
use crate::transform::{
    content_hash, normalize, normalize_mesh_xrefs, normalize_synonyms, resolve_relationships,
    Normalized,
};

/// Accumulates items and hands back a full batch once the threshold is hit
pub struct BatchBuffer<T> {
    items: Vec<T>,
    batch_size: usize,
}

impl<T> BatchBuffer<T> {
    pub fn new(batch_size: usize) -> Self {
        BatchBuffer {
            items: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    /// Add one item; returns a full batch when the threshold is reached
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.items.push(item);
        if self.items.len() >= self.batch_size {
            Some(std::mem::replace(
                &mut self.items,
                Vec::with_capacity(self.batch_size),
            ))
        } else {
            None
        }
    }

    /// Take whatever is buffered, full batch or not
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Whether an incremental run can skip a term entirely
fn is_unchanged(known_hashes: &HashMap<String, String>, term_id: &str, hash: &str) -> bool {
    known_hashes.get(term_id).map(String::as_str) == Some(hash)
}

/// Per-term state carried from phase 1 into phase 2
struct PendingTerm {
    term_id: String,
    iri: String,
    synonyms: Vec<String>,
    mesh_ids: Vec<String>,
    parent_urls: Vec<String>,
}

/// The EFO retrieval-transform-load pipeline
pub struct EfoPipeline {
    config: PipelineConfig,
}

impl EfoPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        EfoPipeline { config }
    }

    /// Run the pipeline to completion
    ///
    /// Opens an execution record before any data work and finalizes it on
    /// every exit path, including Ctrl-C.
    pub async fn run(&self) -> Result<PipelineStats> {
        info!("============================================================");
        info!("EFO Data Pipeline");
        info!(mode = %self.config.mode, "============================================================");
        info!(
            database = %self.config.database.display(),
            batch_size = self.config.batch_size,
            limit = ?self.config.effective_limit(),
            "Configuration"
        );

        let storage = PgStorage::connect(&self.config.database).await?;
        let execution_id = storage.create_execution(self.config.mode).await?;

        let mut stats = PipelineStats::default();

        let outcome = tokio::select! {
            result = self.execute(&storage, &mut stats) => result,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupt signal received, shutting down");
                Err(PipelineError::Interrupted("interrupted by user".to_string()))
            }
        };

        match outcome {
            Ok(()) => {
                storage
                    .finish_execution(execution_id, ExecutionStatus::Success, &stats, None)
                    .await?;
                info!("{}", stats.summary());
                info!(execution_id, "Pipeline completed successfully");
                Ok(stats)
            }
            Err(e) => {
                error!(execution_id, error = %e, "Pipeline failed");
                if let Err(finalize_err) = storage
                    .finish_execution(
                        execution_id,
                        ExecutionStatus::Failed,
                        &stats,
                        Some(&e.to_string()),
                    )
                    .await
                {
                    error!(execution_id, error = %finalize_err, "Failed to finalize execution record");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, storage: &PgStorage, stats: &mut PipelineStats) -> Result<()> {
        let known_hashes = if self.config.mode == RunMode::Incremental {
            if let Some(completed_at) = storage
                .last_successful_execution(self.config.mode)
                .await?
            {
                info!(completed_at = %completed_at, "Last successful incremental run");
            }
            let hashes = storage.stored_term_hashes().await?;
            info!(known = hashes.len(), "Loaded stored content hashes");
            hashes
        } else {
            HashMap::new()
        };

        let client = OlsClient::new(self.config.ols.clone())?;

        // Phase 1: stream, normalize, hash, upsert in batches
        let mut pending: Vec<PendingTerm> = Vec::new();
        let mut buffer: BatchBuffer<Term> = BatchBuffer::new(self.config.batch_size);

        {
            let stream = client.fetch_all_terms(self.config.effective_limit());
            pin_mut!(stream);

            while let Some(raw) = stream.next().await {
                stats.terms_fetched += 1;

                let mut term = match normalize(&raw.term_fields()) {
                    Normalized::Valid(term) => term,
                    Normalized::Invalid => {
                        stats.terms_skipped += 1;
                        continue;
                    }
                };

                let synonyms = raw.synonym_values();
                // Parents are unresolved in phase 1; hash with an empty list
                let hash = content_hash(&term, &synonyms, &[]);

                if is_unchanged(&known_hashes, &term.term_id, &hash) {
                    stats.terms_skipped += 1;
                    continue;
                }
                term.content_hash = Some(hash);

                pending.push(PendingTerm {
                    term_id: term.term_id.clone(),
                    iri: term.iri.clone(),
                    synonyms,
                    mesh_ids: raw.mesh_xrefs(),
                    parent_urls: raw.parent_link_urls(),
                });

                if let Some(batch) = buffer.push(term) {
                    let (inserted, updated) = storage.upsert_terms(&batch).await?;
                    stats.terms_inserted += inserted;
                    stats.terms_updated += updated;
                }
            }
        }

        let remainder = buffer.drain();
        if !remainder.is_empty() {
            let (inserted, updated) = storage.upsert_terms(&remainder).await?;
            stats.terms_inserted += inserted;
            stats.terms_updated += updated;
        }

        info!(
            fetched = stats.terms_fetched,
            written = stats.terms_inserted + stats.terms_updated,
            skipped = stats.terms_skipped,
            "Phase 1 complete"
        );

        if pending.is_empty() {
            info!("No terms to post-process, skipping phases 1.5 and 2");
            return Ok(());
        }

        // Phase 1.5: resolve parent links
        let parent_urls: Vec<String> = pending
            .iter()
            .flat_map(|p| p.parent_urls.iter().cloned())
            .collect();
        let parents_by_url = client.resolve_parents(&parent_urls).await;

        // Phase 2: load dependent rows against the committed terms
        let term_id_map = storage.term_id_map().await?;
        let iri_to_id = storage.iri_to_id_map().await?;

        let synonym_rows: Vec<SynonymRow> = pending
            .iter()
            .flat_map(|p| normalize_synonyms(&p.term_id, &p.synonyms))
            .collect();
        for chunk in synonym_rows.chunks(self.config.batch_size) {
            let (inserted, dropped) = storage.insert_synonyms(chunk, &term_id_map).await?;
            stats.synonyms_inserted += inserted;
            stats.references_dropped += dropped;
        }

        let mut relationships: Vec<Relationship> = Vec::new();
        for p in &pending {
            let parent_iris: Vec<String> = p
                .parent_urls
                .iter()
                .flat_map(|url| parents_by_url.get(url).cloned().unwrap_or_default())
                .collect();
            let (resolved, dropped) = resolve_relationships(&p.iri, &parent_iris, &iri_to_id);
            relationships.extend(resolved);
            stats.references_dropped += dropped;
        }
        for chunk in relationships.chunks(self.config.batch_size) {
            stats.relationships_inserted += storage.insert_relationships(chunk).await?;
        }

        let xref_rows: Vec<CrossReference> = pending
            .iter()
            .flat_map(|p| normalize_mesh_xrefs(&p.term_id, &p.mesh_ids))
            .collect();
        for chunk in xref_rows.chunks(self.config.batch_size) {
            let (inserted, dropped) = storage.insert_xrefs(chunk, &term_id_map).await?;
            stats.xrefs_inserted += inserted;
            stats.references_dropped += dropped;
        }

        info!(
            synonyms = stats.synonyms_inserted,
            relationships = stats.relationships_inserted,
            xrefs = stats.xrefs_inserted,
            dropped = stats.references_dropped,
            "Phase 2 complete"
        );

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_buffer_flushes_at_threshold() {
        let mut buffer = BatchBuffer::new(2);
        let mut flushed: Vec<Vec<i32>> = Vec::new();

        for i in 0..5 {
            if let Some(batch) = buffer.push(i) {
                flushed.push(batch);
            }
        }
        let remainder = buffer.drain();

        assert_eq!(flushed, vec![vec![0, 1], vec![2, 3]]);
        assert_eq!(remainder, vec![4]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_batch_buffer_drain_when_empty() {
        let mut buffer: BatchBuffer<i32> = BatchBuffer::new(3);
        assert!(buffer.drain().is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_is_unchanged() {
        let mut known = HashMap::new();
        known.insert("EFO:1".to_string(), "abc".to_string());

        assert!(is_unchanged(&known, "EFO:1", "abc"));
        assert!(!is_unchanged(&known, "EFO:1", "def"));
        assert!(!is_unchanged(&known, "EFO:2", "abc"));
        assert!(!is_unchanged(&HashMap::new(), "EFO:1", "abc"));
    }
}
