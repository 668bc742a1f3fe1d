//! Data model shared by the store facade and storage engines.
//!
//! # Responsibility
//! - Define field values, the typed record contract and the schema model.
//!
//! # Invariants
//! - Every stored record is identified by a stable `RecordId`.
//! - Schemas are validated before a store is opened with them.

pub mod record;
pub mod schema;
pub mod value;
