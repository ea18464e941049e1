// EFO Pipeline Data Models

use serde::{Deserialize, Serialize};

// ============================================================================
// Run Mode
// ============================================================================

/// Pipeline execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Bounded run for development and testing (respects the record limit)
    #[default]
    Test,
    /// Complete dataset refresh
    Full,
    /// Write only terms whose content hash changed since the last run
    Incremental,
}

impl RunMode {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "test" => Ok(RunMode::Test),
            "full" => Ok(RunMode::Full),
            "incremental" => Ok(RunMode::Incremental),
            _ => Err(format!("Unknown execution mode: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Test => "test",
            RunMode::Full => "full",
            RunMode::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Execution Status
// ============================================================================

/// Terminal status of a pipeline execution record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Term
// ============================================================================

/// A normalized EFO term ready for storage
///
/// `term_id`, `iri` and `label` are guaranteed non-empty after normalization;
/// a record missing any of them is rejected entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Term {
    /// Natural key (e.g., "EFO:0000001")
    pub term_id: String,

    /// Globally unique IRI (e.g., "http://www.ebi.ac.uk/efo/EFO_0000001")
    pub iri: String,

    /// Primary label
    pub label: String,

    /// Optional description; empty strings collapse to None
    pub description: Option<String>,

    /// SHA-256 digest over label, description, synonyms and parent IRIs,
    /// used for change detection in incremental runs
    pub content_hash: Option<String>,
}

// ============================================================================
// Dependent Entities
// ============================================================================

/// A synonym row keyed by the owning term's natural key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymRow {
    pub term_id: String,
    pub synonym: String,
}

/// A directed is-a edge between two terms, by internal id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    pub child_id: i32,
    pub parent_id: i32,
}

/// A cross-reference from a term to an external vocabulary entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossReference {
    pub term_id: String,
    pub external_id: String,
    pub database: String,
}

// ============================================================================
// Pipeline Statistics
// ============================================================================

/// Aggregate counters for one pipeline execution
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    pub terms_fetched: usize,
    pub terms_inserted: usize,
    pub terms_updated: usize,
    pub terms_skipped: usize,
    pub synonyms_inserted: usize,
    pub relationships_inserted: usize,
    pub xrefs_inserted: usize,
    pub references_dropped: usize,
}

impl PipelineStats {
    /// Human-readable end-of-run summary
    pub fn summary(&self) -> String {
        format!(
            "Execution Summary:\n\
             - Terms fetched: {}\n\
             - Terms inserted: {}\n\
             - Terms updated: {}\n\
             - Terms skipped: {}\n\
             - Synonyms inserted: {}\n\
             - Relationships inserted: {}\n\
             - Cross-references inserted: {}\n\
             - Unresolved references dropped: {}",
            self.terms_fetched,
            self.terms_inserted,
            self.terms_updated,
            self.terms_skipped,
            self.synonyms_inserted,
            self.relationships_inserted,
            self.xrefs_inserted,
            self.references_dropped
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_roundtrip() {
        for mode in [RunMode::Test, RunMode::Full, RunMode::Incremental] {
            assert_eq!(RunMode::from_str(mode.as_str()).unwrap(), mode);
        }
        assert!(RunMode::from_str("dry-run").is_err());
    }

    #[test]
    fn test_execution_status_strings() {
        assert_eq!(ExecutionStatus::Running.as_str(), "running");
        assert_eq!(ExecutionStatus::Success.as_str(), "success");
        assert_eq!(ExecutionStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_stats_summary() {
        let stats = PipelineStats {
            terms_fetched: 100,
            terms_inserted: 80,
            terms_updated: 5,
            terms_skipped: 15,
            ..Default::default()
        };

        let summary = stats.summary();
        assert!(summary.contains("Terms fetched: 100"));
        assert!(summary.contains("Terms inserted: 80"));
        assert!(summary.contains("Terms skipped: 15"));
    }
}
