//! ClickHouse type conversions for sync-core types.
//!
//! This crate maps the semantic column types of sync-core onto ClickHouse
//! column types and converts rows to and from ClickHouse's JSON formats.
//!
//! # Structure
//!
//! - `ddl`: Generate ClickHouse DDL and statements from `ColumnDescriptor`s
//! - `schema`: ClickHouse column type string → `InferredType`
//! - `forward`: Convert `Row` → `JSONEachRow` line (for INSERT operations)
//! - `reverse`: Convert ClickHouse JSON values → `Value` (for reading data)
//!
//! # Example
//!
//! ```rust,ignore
//! use clickhouse_types::{ClickHouseDdl, ToDdl, map_to_destination_columns};
//! use sync_core::InferredType;
//!
//! let ddl = ClickHouseDdl;
//! assert_eq!(ddl.to_ddl(InferredType::Boolean, false), "Bool");
//!
//! let defs = map_to_destination_columns(&columns)?;
//! ```

pub mod ddl;
pub mod forward;
pub mod reverse;
pub mod schema;

pub use ddl::{
    create_table_statement, insert_statement, map_to_destination_columns, qualified_table_name,
    quote_identifier, select_statement, ClickHouseDdl, DestinationColumnDef, ToDdl,
};
pub use forward::{row_to_json_line, value_to_json};
pub use reverse::{json_to_value, row_from_compact};
pub use schema::clickhouse_type_to_inferred;
