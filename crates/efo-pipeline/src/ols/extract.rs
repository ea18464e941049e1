// OLS Wire Format Extraction
//
// Typed representations of the OLS API JSON payloads plus pure accessors
// that pull out the fields the pipeline cares about. No I/O here; the
// client hands these structs over and the orchestrator calls the accessors.

use serde::Deserialize;

// ============================================================================
// Page Envelope
// ============================================================================

/// One page of the paginated terms listing
#[derive(Debug, Clone, Deserialize)]
pub struct TermsPage {
    #[serde(rename = "_embedded")]
    pub embedded: Option<Embedded>,

    pub page: Option<PageInfo>,
}

/// The `_embedded` container holding the term records
#[derive(Debug, Clone, Deserialize)]
pub struct Embedded {
    #[serde(default)]
    pub terms: Vec<RawTerm>,
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub number: u32,

    #[serde(rename = "totalPages", default)]
    pub total_pages: u32,
}

impl TermsPage {
    /// Records on this page (empty if `_embedded` is missing)
    pub fn terms(&self) -> &[RawTerm] {
        self.embedded.as_ref().map(|e| e.terms.as_slice()).unwrap_or(&[])
    }

    /// Take ownership of the records on this page
    pub fn into_terms(self) -> Vec<RawTerm> {
        self.embedded.map(|e| e.terms).unwrap_or_default()
    }

    /// Whether this page is the last one according to the metadata
    pub fn is_last_page(&self) -> bool {
        match self.page {
            Some(info) if info.total_pages > 0 => info.number >= info.total_pages - 1,
            _ => false,
        }
    }
}

/// The parents sub-resource payload (same embedded-terms envelope)
#[derive(Debug, Clone, Deserialize)]
pub struct ParentsPage {
    #[serde(rename = "_embedded")]
    pub embedded: Option<Embedded>,
}

impl ParentsPage {
    /// IRIs of the embedded parent terms
    pub fn parent_iris(&self) -> Vec<String> {
        self.embedded
            .as_ref()
            .map(|e| {
                e.terms
                    .iter()
                    .filter_map(|t| t.iri.clone())
                    .filter(|iri| !iri.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Term Record
// ============================================================================

/// A raw term record as returned by OLS
///
/// Every field is optional; validation happens in the transformer, not here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTerm {
    pub obo_id: Option<String>,

    pub iri: Option<String>,

    pub label: Option<String>,

    /// OLS delivers the description as a (possibly empty) list
    #[serde(default)]
    pub description: Option<Vec<String>>,

    #[serde(default)]
    pub synonyms: Option<Vec<Option<String>>>,

    /// Structured cross-references: `[{"database": "MSH", "id": "D001943"}]`
    #[serde(default)]
    pub obo_xref: Option<Vec<OboXref>>,

    /// Annotation block carrying flat `"MSH:D001943"`-style cross-references
    #[serde(default)]
    pub annotation: Option<Annotation>,

    #[serde(rename = "_links", default)]
    pub links: Option<Links>,
}

/// One structured cross-reference entry
#[derive(Debug, Clone, Deserialize)]
pub struct OboXref {
    pub database: Option<String>,
    pub id: Option<String>,
}

/// Annotation section; only the cross-reference list is extracted
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub database_cross_reference: Vec<String>,
}

/// The `_links` section of a term record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub parents: Option<ParentsLink>,
}

/// The parents link appears as a single object, a list of objects,
/// or (rarely) a bare URL string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParentsLink {
    One(LinkHref),
    Many(Vec<LinkHref>),
    Bare(String),
}

/// A single `{"href": "..."}` link object
#[derive(Debug, Clone, Deserialize)]
pub struct LinkHref {
    pub href: Option<String>,
}

// ============================================================================
// Extracted Fields
// ============================================================================

/// Core term fields pulled out of a raw record, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedTerm {
    pub term_id: String,
    pub iri: String,
    pub label: String,
    pub description: Option<String>,
}

impl RawTerm {
    /// Extract the core identifying fields (missing fields become empty)
    pub fn term_fields(&self) -> ExtractedTerm {
        ExtractedTerm {
            term_id: self.obo_id.clone().unwrap_or_default(),
            iri: self.iri.clone().unwrap_or_default(),
            label: self.label.clone().unwrap_or_default(),
            description: self
                .description
                .as_ref()
                .and_then(|d| d.first())
                .filter(|s| !s.is_empty())
                .cloned(),
        }
    }

    /// Synonym strings with nulls and empties filtered out
    pub fn synonym_values(&self) -> Vec<String> {
        self.synonyms
            .as_ref()
            .map(|list| {
                list.iter()
                    .flatten()
                    .filter(|s| !s.is_empty())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// URLs of the parents sub-resource from `_links.parents`, in all
    /// three shapes the API produces
    pub fn parent_link_urls(&self) -> Vec<String> {
        let Some(parents) = self.links.as_ref().and_then(|l| l.parents.as_ref()) else {
            return Vec::new();
        };

        match parents {
            ParentsLink::One(link) => link
                .href
                .iter()
                .filter(|h| !h.is_empty())
                .cloned()
                .collect(),
            ParentsLink::Many(links) => links
                .iter()
                .filter_map(|l| l.href.clone())
                .filter(|h| !h.is_empty())
                .collect(),
            ParentsLink::Bare(url) => {
                if url.is_empty() {
                    Vec::new()
                } else {
                    vec![url.clone()]
                }
            }
        }
    }

    /// MeSH cross-reference identifiers, from both the structured
    /// `obo_xref` entries and the flat `MSH:`-prefixed annotation strings.
    /// Duplicates are removed, first occurrence wins.
    pub fn mesh_xrefs(&self) -> Vec<String> {
        let mut mesh_ids: Vec<String> = Vec::new();

        if let Some(xrefs) = &self.obo_xref {
            for xref in xrefs {
                let database = xref.database.as_deref().unwrap_or_default();
                let upper = database.to_uppercase();
                if upper.contains("MSH") || upper.contains("MESH") {
                    if let Some(id) = xref.id.as_deref().filter(|id| !id.is_empty()) {
                        if !mesh_ids.iter().any(|existing| existing == id) {
                            mesh_ids.push(id.to_string());
                        }
                    }
                }
            }
        }

        if let Some(annotation) = &self.annotation {
            for xref in &annotation.database_cross_reference {
                if let Some(id) = xref.strip_prefix("MSH:").filter(|id| !id.is_empty()) {
                    if !mesh_ids.iter().any(|existing| existing == id) {
                        mesh_ids.push(id.to_string());
                    }
                }
            }
        }

        mesh_ids
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn term_from_json(json: serde_json::Value) -> RawTerm {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_term_fields_complete() {
        let term = term_from_json(serde_json::json!({
            "obo_id": "EFO:0000001",
            "iri": "http://www.ebi.ac.uk/efo/EFO_0000001",
            "label": "experimental factor",
            "description": ["An experimental factor in Array Express."]
        }));

        let fields = term.term_fields();
        assert_eq!(fields.term_id, "EFO:0000001");
        assert_eq!(fields.iri, "http://www.ebi.ac.uk/efo/EFO_0000001");
        assert_eq!(fields.label, "experimental factor");
        assert_eq!(
            fields.description.as_deref(),
            Some("An experimental factor in Array Express.")
        );
    }

    #[test]
    fn test_term_fields_missing_become_empty() {
        let term = term_from_json(serde_json::json!({ "label": "orphan" }));

        let fields = term.term_fields();
        assert_eq!(fields.term_id, "");
        assert_eq!(fields.iri, "");
        assert_eq!(fields.label, "orphan");
        assert!(fields.description.is_none());
    }

    #[test]
    fn test_empty_description_list() {
        let term = term_from_json(serde_json::json!({ "description": [] }));
        assert!(term.term_fields().description.is_none());
    }

    #[test]
    fn test_synonyms_filter_nulls_and_empties() {
        let term = term_from_json(serde_json::json!({
            "synonyms": ["anaemia", null, "", "anemia"]
        }));
        assert_eq!(term.synonym_values(), vec!["anaemia", "anemia"]);
    }

    #[test]
    fn test_synonyms_absent() {
        let term = term_from_json(serde_json::json!({}));
        assert!(term.synonym_values().is_empty());
    }

    #[test]
    fn test_parent_link_single_object() {
        let term = term_from_json(serde_json::json!({
            "_links": { "parents": { "href": "https://example.org/parents/1" } }
        }));
        assert_eq!(
            term.parent_link_urls(),
            vec!["https://example.org/parents/1"]
        );
    }

    #[test]
    fn test_parent_link_list() {
        let term = term_from_json(serde_json::json!({
            "_links": { "parents": [
                { "href": "https://example.org/parents/1" },
                { "href": "https://example.org/parents/2" }
            ]}
        }));
        assert_eq!(term.parent_link_urls().len(), 2);
    }

    #[test]
    fn test_parent_link_bare_string() {
        let term = term_from_json(serde_json::json!({
            "_links": { "parents": "https://example.org/parents/3" }
        }));
        assert_eq!(
            term.parent_link_urls(),
            vec!["https://example.org/parents/3"]
        );
    }

    #[test]
    fn test_parent_link_missing() {
        let term = term_from_json(serde_json::json!({ "_links": {} }));
        assert!(term.parent_link_urls().is_empty());
    }

    #[test]
    fn test_mesh_xrefs_structured() {
        let term = term_from_json(serde_json::json!({
            "obo_xref": [
                { "database": "MSH", "id": "D001943" },
                { "database": "NCIT", "id": "C2910" },
                { "database": "MeSH", "id": "D009765" }
            ]
        }));
        assert_eq!(term.mesh_xrefs(), vec!["D001943", "D009765"]);
    }

    #[test]
    fn test_mesh_xrefs_flat_annotation() {
        let term = term_from_json(serde_json::json!({
            "annotation": {
                "database_cross_reference": ["MSH:D001943", "ICD10:E66", "MSH:"]
            }
        }));
        assert_eq!(term.mesh_xrefs(), vec!["D001943"]);
    }

    #[test]
    fn test_mesh_xrefs_deduplicated_across_shapes() {
        let term = term_from_json(serde_json::json!({
            "obo_xref": [{ "database": "MSH", "id": "D001943" }],
            "annotation": { "database_cross_reference": ["MSH:D001943"] }
        }));
        assert_eq!(term.mesh_xrefs(), vec!["D001943"]);
    }

    #[test]
    fn test_page_envelope() {
        let page: TermsPage = serde_json::from_value(serde_json::json!({
            "_embedded": { "terms": [{ "obo_id": "EFO:1" }, { "obo_id": "EFO:2" }] },
            "page": { "number": 2, "totalPages": 3 }
        }))
        .unwrap();

        assert_eq!(page.terms().len(), 2);
        assert!(page.is_last_page());
    }

    #[test]
    fn test_page_not_last() {
        let page: TermsPage = serde_json::from_value(serde_json::json!({
            "_embedded": { "terms": [] },
            "page": { "number": 0, "totalPages": 3 }
        }))
        .unwrap();
        assert!(!page.is_last_page());
    }

    #[test]
    fn test_parents_page_iris() {
        let page: ParentsPage = serde_json::from_value(serde_json::json!({
            "_embedded": { "terms": [
                { "iri": "http://www.ebi.ac.uk/efo/EFO_0000001" },
                { "label": "no iri here" }
            ]}
        }))
        .unwrap();
        assert_eq!(page.parent_iris(), vec!["http://www.ebi.ac.uk/efo/EFO_0000001"]);
    }
}
