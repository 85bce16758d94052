//! # Resolver - match loose building references against an entrance registry
//!
//! A job takes an uploaded batch (building ids, municipality codes, GeoJSON
//! shapes or free-text addresses), splits it into tasks, matches every task
//! against the building-entrance registry and keeps the results for export.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  CSV/GeoJSON │────▶│   Prepare    │────▶│   Resolve    │────▶│  CSV / JSON  │
//! │   (upload)   │     │ (rows→tasks) │     │ (registry)   │     │   (export)   │
//! └──────────────┘     └──────────────┘     └──────────────┘     └──────────────┘
//!                              ▲                    ▲
//!                              └──── job events ────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resolver::{JobType, JobMetadata, Pipeline};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = Pipeline::builder().build();
//!     let job = pipeline
//!         .run_job(JobType::BuildingIds, b"egid\n101\n".to_vec(), JobMetadata::default())
//!         .await
//!         .unwrap();
//!     println!("{} results", pipeline.results(job.id).await.unwrap().len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Jobs, tasks, results, entrances
//! - [`parser`] - CSV reading with format detection
//! - [`address`] - Street parsing and normalization
//! - [`spatial`] - Reference systems and GeoJSON
//! - [`store`] - Job, task and result repositories
//! - [`registry`] - Building-entrance lookups
//! - [`job`] - Lifecycle events, handlers and dispatcher
//! - [`prepare`] - Per job type preparers
//! - [`resolve`] - Per job type resolvers
//! - [`export`] - Result export
//! - [`pipeline`] - Wiring of the above
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Input handling
pub mod address;
pub mod parser;
pub mod spatial;

// Storage and lookups
pub mod registry;
pub mod store;

// Processing
pub mod export;
pub mod job;
pub mod pipeline;
pub mod prepare;
pub mod resolve;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, CsvError, ExportError, GeoJsonError, InvalidInputData, JobError, PrepareError,
    RegistryError, ResolveError, ServerError, StoreError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AdditionalData, BuildingEntrance, Confidence, JobId, JobMetadata, JobStatus, JobType, MatchType,
    ResolverJob, ResolverJobFailure, ResolverResult, ResolverTask,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use config::Config;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use registry::{AddressSearchIndex, BuildingRegistry, InMemoryRegistry};
pub use store::MemoryStore;
