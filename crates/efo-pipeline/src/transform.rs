// EFO Term Transformation
//
// Validation, normalization and content hashing for extracted term data.
// Everything here is pure: no I/O, no clock, no database.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::models::{CrossReference, Relationship, SynonymRow, Term};
use crate::ols::extract::ExtractedTerm;

/// Source-database tag for MeSH cross-references
pub const MESH_DATABASE: &str = "MSH";

/// Result of normalizing an extracted term
///
/// Invalid records are a counted skip, never a fault: "no data" and "error"
/// stay distinct from a valid-but-empty term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Valid(Term),
    Invalid,
}

impl Normalized {
    pub fn into_term(self) -> Option<Term> {
        match self {
            Normalized::Valid(term) => Some(term),
            Normalized::Invalid => None,
        }
    }
}

/// Normalize and validate an extracted term
///
/// Trims all fields and requires `term_id`, `iri` and `label` to be
/// non-empty afterwards; a record missing any of them is rejected entirely.
/// An empty description collapses to `None`.
pub fn normalize(extracted: &ExtractedTerm) -> Normalized {
    let term_id = extracted.term_id.trim();
    let iri = extracted.iri.trim();
    let label = extracted.label.trim();

    if term_id.is_empty() || iri.is_empty() || label.is_empty() {
        warn!(
            term_id,
            iri, label, "Invalid term: missing required fields"
        );
        return Normalized::Invalid;
    }

    let description = extracted
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Normalized::Valid(Term {
        term_id: term_id.to_string(),
        iri: iri.to_string(),
        label: label.to_string(),
        description,
        content_hash: None,
    })
}

/// Normalize synonyms for one term: trimmed, non-empty values only
pub fn normalize_synonyms(term_id: &str, synonyms: &[String]) -> Vec<SynonymRow> {
    synonyms
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| SynonymRow {
            term_id: term_id.to_string(),
            synonym: s.to_string(),
        })
        .collect()
}

/// Normalize MeSH cross-references for one term
pub fn normalize_mesh_xrefs(term_id: &str, mesh_ids: &[String]) -> Vec<CrossReference> {
    mesh_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(|id| CrossReference {
            term_id: term_id.to_string(),
            external_id: id.to_string(),
            database: MESH_DATABASE.to_string(),
        })
        .collect()
}

/// Compute the SHA-256 content hash of a term
///
/// The digest covers the label, description, sorted synonym list and sorted
/// parent-IRI list, so it is invariant under reordering but changes whenever
/// any of those change. The pipeline computes this before parent resolution
/// with an empty parent list, so a parents-only change does not flip the
/// stored hash in incremental mode (known approximation, kept deliberately).
pub fn content_hash(term: &Term, synonyms: &[String], parent_iris: &[String]) -> String {
    let mut sorted_synonyms: Vec<&str> = synonyms.iter().map(String::as_str).collect();
    sorted_synonyms.sort_unstable();

    let mut sorted_parents: Vec<&str> = parent_iris.iter().map(String::as_str).collect();
    sorted_parents.sort_unstable();

    let content = format!(
        "{}|{}|{}|{}",
        term.label,
        term.description.as_deref().unwrap_or(""),
        sorted_synonyms.join(","),
        sorted_parents.join(",")
    );

    let digest = Sha256::digest(content.as_bytes());
    format!("{:x}", digest)
}

/// Extract the target IRI from an OLS parents href
///
/// The href can be a direct IRI, a URL carrying an `?iri=` query parameter,
/// or an OLS terms endpoint with a percent-encoded IRI in its path.
pub fn extract_iri_from_href(href: &str) -> String {
    if let Some((_, rest)) = href.split_once("?iri=") {
        let iri = rest.split('&').next().unwrap_or(rest);
        return urlencoding::decode(iri)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| iri.to_string());
    }

    if let Some((_, encoded)) = href.split_once("/terms/") {
        return urlencoding::decode(encoded)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| encoded.to_string());
    }

    href.to_string()
}

/// Resolve parent references into internal-id relationship rows
///
/// Returns the resolved rows plus the number of dropped references (child or
/// parent IRIs absent from the mapping). Unresolved references are dropped,
/// not raised.
pub fn resolve_relationships(
    child_iri: &str,
    parent_refs: &[String],
    iri_to_id: &HashMap<String, i32>,
) -> (Vec<Relationship>, usize) {
    let Some(&child_id) = iri_to_id.get(child_iri) else {
        debug!(child_iri, "Child IRI not found in mapping");
        return (Vec::new(), parent_refs.len());
    };

    let mut relationships = Vec::new();
    let mut dropped = 0;

    for parent_ref in parent_refs {
        let parent_iri = extract_iri_from_href(parent_ref);
        match iri_to_id.get(&parent_iri) {
            Some(&parent_id) => relationships.push(Relationship {
                child_id,
                parent_id,
            }),
            None => {
                debug!(parent_iri, "Parent IRI not found in mapping");
                dropped += 1;
            }
        }
    }

    (relationships, dropped)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(term_id: &str, iri: &str, label: &str) -> ExtractedTerm {
        ExtractedTerm {
            term_id: term_id.to_string(),
            iri: iri.to_string(),
            label: label.to_string(),
            description: None,
        }
    }

    fn valid_term() -> Term {
        normalize(&extracted(
            "EFO:0000001",
            "http://www.ebi.ac.uk/efo/EFO_0000001",
            "experimental factor",
        ))
        .into_term()
        .unwrap()
    }

    #[test]
    fn test_normalize_valid() {
        let mut raw = extracted("  EFO:0000001 ", " http://x ", " anemia ");
        raw.description = Some("  a blood disorder  ".to_string());

        let term = normalize(&raw).into_term().unwrap();
        assert_eq!(term.term_id, "EFO:0000001");
        assert_eq!(term.iri, "http://x");
        assert_eq!(term.label, "anemia");
        assert_eq!(term.description.as_deref(), Some("a blood disorder"));
        assert!(term.content_hash.is_none());
    }

    #[test]
    fn test_normalize_rejects_missing_fields() {
        assert_eq!(normalize(&extracted("", "http://x", "label")), Normalized::Invalid);
        assert_eq!(normalize(&extracted("EFO:1", "", "label")), Normalized::Invalid);
        assert_eq!(normalize(&extracted("EFO:1", "http://x", "   ")), Normalized::Invalid);
    }

    #[test]
    fn test_normalize_collapses_blank_description() {
        let mut raw = extracted("EFO:1", "http://x", "label");
        raw.description = Some("   ".to_string());
        let term = normalize(&raw).into_term().unwrap();
        assert!(term.description.is_none());
    }

    #[test]
    fn test_normalize_synonyms() {
        let rows = normalize_synonyms(
            "EFO:1",
            &[" anaemia ".to_string(), "".to_string(), "anemia".to_string()],
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].synonym, "anaemia");
        assert_eq!(rows[1].synonym, "anemia");
        assert!(rows.iter().all(|r| r.term_id == "EFO:1"));
    }

    #[test]
    fn test_normalize_mesh_xrefs() {
        let xrefs = normalize_mesh_xrefs("EFO:1", &["D001943".to_string(), "  ".to_string()]);
        assert_eq!(xrefs.len(), 1);
        assert_eq!(xrefs[0].external_id, "D001943");
        assert_eq!(xrefs[0].database, "MSH");
    }

    #[test]
    fn test_hash_is_order_insensitive() {
        let term = valid_term();
        let h1 = content_hash(&term, &["b".to_string(), "a".to_string()], &[]);
        let h2 = content_hash(&term, &["a".to_string(), "b".to_string()], &[]);
        assert_eq!(h1, h2);

        let p1 = content_hash(&term, &[], &["http://p2".to_string(), "http://p1".to_string()]);
        let p2 = content_hash(&term, &[], &["http://p1".to_string(), "http://p2".to_string()]);
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_hash_is_deterministic_hex() {
        let term = valid_term();
        let hash = content_hash(&term, &[], &[]);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, content_hash(&term, &[], &[]));
    }

    #[test]
    fn test_hash_changes_with_description() {
        let mut term = valid_term();
        let before = content_hash(&term, &[], &[]);
        term.description = Some("different".to_string());
        assert_ne!(before, content_hash(&term, &[], &[]));
    }

    #[test]
    fn test_hash_changes_with_set_membership() {
        let term = valid_term();
        let base = content_hash(&term, &["a".to_string()], &[]);
        assert_ne!(base, content_hash(&term, &["a".to_string(), "b".to_string()], &[]));
        assert_ne!(
            base,
            content_hash(&term, &["a".to_string()], &["http://p1".to_string()])
        );
    }

    #[test]
    fn test_extract_iri_from_query_param() {
        let href = "https://www.ebi.ac.uk/ols4/api/ontologies/efo/parents?iri=http%3A%2F%2Fwww.ebi.ac.uk%2Fefo%2FEFO_0000001&size=20";
        assert_eq!(
            extract_iri_from_href(href),
            "http://www.ebi.ac.uk/efo/EFO_0000001"
        );
    }

    #[test]
    fn test_extract_iri_from_terms_path() {
        let href = "https://www.ebi.ac.uk/ols4/api/ontologies/efo/terms/http%3A%2F%2Fwww.ebi.ac.uk%2Fefo%2FEFO_0000001";
        assert_eq!(
            extract_iri_from_href(href),
            "http://www.ebi.ac.uk/efo/EFO_0000001"
        );
    }

    #[test]
    fn test_extract_iri_passthrough() {
        let iri = "http://www.ebi.ac.uk/efo/EFO_0000001";
        assert_eq!(extract_iri_from_href(iri), iri);
    }

    #[test]
    fn test_resolve_relationships() {
        let mut map = HashMap::new();
        map.insert("http://child".to_string(), 1);
        map.insert("http://p1".to_string(), 2);

        let (rels, dropped) = resolve_relationships(
            "http://child",
            &["http://p1".to_string(), "http://missing".to_string()],
            &map,
        );

        assert_eq!(rels, vec![Relationship { child_id: 1, parent_id: 2 }]);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_resolve_relationships_unknown_child() {
        let map = HashMap::new();
        let (rels, dropped) =
            resolve_relationships("http://nobody", &["http://p1".to_string()], &map);
        assert!(rels.is_empty());
        assert_eq!(dropped, 1);
    }
}
