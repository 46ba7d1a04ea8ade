// Persisted state

pub mod mapping_store;

pub use mapping_store::FileMappingStore;
