//! Common types and traits shared across `ArchesETL` crates.
//!
//! This crate provides the abstractions shared between `archesetl-core` and the
//! feature source crates, preventing circular dependencies.

pub mod drivers;
pub mod error;
pub mod source;

// Re-export commonly used types
pub use drivers::{Driver, DriverCapabilities, SupportStatus};
pub use error::{SourceError, SourceResult};
pub use source::{FeatureIter, FeatureRecord, FeatureSource, ShapeType, dataset_name};
