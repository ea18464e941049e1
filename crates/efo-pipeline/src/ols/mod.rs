// OLS (Ontology Lookup Service) API Module
//
// Handles retrieval of EFO terms from the EBI OLS API:
// - Client: paginated fetching with retry/backoff and a bounded-concurrency
//   resolver for the parents sub-resource
// - Extract: typed wire-format structs and pure field accessors
//
// Data source: https://www.ebi.ac.uk/ols4/api/ontologies/efo/terms

pub mod client;
pub mod extract;

pub use client::{OlsClient, PageOutcome};
pub use extract::{ExtractedTerm, ParentsPage, RawTerm, TermsPage};
