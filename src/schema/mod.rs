// src/schema/mod.rs

pub mod catalog;
pub mod types;

pub use catalog::{
    fetch_authoritative, ExcludePattern, SchemaCatalog, SnapshotCatalog, TabColumnRow,
    DEFAULT_EXCLUDE_PATTERN, DEFAULT_OWNER, DEFAULT_TABLE,
};
pub use types::{AuthoritativeColumnSet, ColumnSpec, LengthUnit, OffsetRange};
