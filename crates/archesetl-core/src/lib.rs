//! `archesetl-core` is the core library of `ArchesETL`, turning geospatial
//! datasets into Arches resource import files.
//!
//! This crate includes:
//! - **Conflig model** ([`config`]): the mapping from dataset fields to entity codes.
//! - **Authority reconciliation** ([`authority`]): concept lookup in authority documents.
//! - **Id sequencing** ([`sequence`]): resource and group ids, resumable across runs.
//! - **Record transformation** ([`transform`]) writing `.arches` rows through [`output`].
//! - **Relationships** ([`relations`]): pairs of resources sharing a join value.
//! - **Driver registry** ([`drivers`]): the dataset formats that can be read.
//!
//! [`operations`] ties these together into complete export runs.

pub mod authority;
pub mod config;
pub mod drivers;
pub mod error;
pub mod operations;
pub mod output;
pub mod relations;
pub mod sequence;
pub mod transform;
pub mod types;
pub mod utils;

pub use error::{ArchesEtlError, Result};
