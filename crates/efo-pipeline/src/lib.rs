//! EFO Data Pipeline Library
//!
//! Retrieves Experimental Factor Ontology terms from the EBI OLS API,
//! detects changes by content hash, and bulk-loads them into PostgreSQL.
//!
//! # Example
//!
//! ```no_run
//! use efo_pipeline::config::PipelineConfig;
//! use efo_pipeline::pipeline::EfoPipeline;
//!
//! #[tokio::main]
//! async fn main() -> efo_common::Result<()> {
//!     let config = PipelineConfig::load()?;
//!     let stats = EfoPipeline::new(config).run().await?;
//!     println!("{}", stats.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod models;
pub mod ols;
pub mod pipeline;
pub mod storage;
pub mod transform;

pub use config::{OlsConfig, PipelineConfig};
pub use models::{PipelineStats, RunMode};
pub use pipeline::EfoPipeline;
