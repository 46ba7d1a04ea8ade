//! `benchgrid-recon`: declaration-to-benchmark reconciliation engine.
//!
//! Pure engine crate: receives declaration rows, a field mapping and a
//! benchmark source, returns the grouped and normalized target table.
//! No file, database or CLI dependencies.

pub mod assemble;
pub mod config;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod mapper;
pub mod mapping;
pub mod merger;
pub mod model;
pub mod normalize;
pub mod strategy;
pub mod table;

pub use config::{ColumnClasses, ReconConfig};
pub use engine::{run, BenchmarkSource, TableSource};
pub use error::ReconError;
pub use mapping::{MappingStore, MappingTable, MemoryStore, SourceRole, DEFAULT_MAPPING_KEY};
pub use model::{FetchedBenchmarks, FilterSpec, Lookups, PurchaseMode, ReportConfig, RunInput, RunOutput, Warning};
pub use strategy::Strategy;
pub use table::{Record, RowSource, Table, Value};
