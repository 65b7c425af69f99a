//! ClickHouse DDL generation from InferredType.
//!
//! This module maps sync-core's `InferredType` to ClickHouse column types and
//! builds the handful of statements the store adapter sends. Every identifier
//! passes through [`quote_identifier`] before it is spliced into SQL.

use sync_core::{ColumnDescriptor, InferredType, SchemaError};

pub use sync_core::ToDdl;

/// ClickHouse DDL generator.
pub struct ClickHouseDdl;

impl ToDdl for ClickHouseDdl {
    fn to_ddl(&self, inferred_type: InferredType, nullable: bool) -> String {
        let base = match inferred_type {
            InferredType::Integer => "Int64",
            InferredType::Float => "Float64",
            // Stored as UInt8, read back as a boolean
            InferredType::Boolean => "Bool",
            InferredType::DateTime => "DateTime",
            InferredType::Text => "String",
        };
        if nullable {
            format!("Nullable({base})")
        } else {
            base.to_string()
        }
    }
}

/// One column of a table the store is asked to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationColumnDef {
    /// Unquoted column name
    pub name: String,

    /// ClickHouse column type, e.g. `Nullable(Int64)`
    pub column_type: String,
}

impl DestinationColumnDef {
    /// Render as `<quoted name> <type>` for a column list.
    pub fn to_sql(&self) -> Result<String, SchemaError> {
        Ok(format!("{} {}", quote_identifier(&self.name)?, self.column_type))
    }
}

fn is_bare_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Make `name` safe to splice into a statement.
///
/// Names made of `[A-Za-z_][A-Za-z0-9_]*` are emitted bare. Anything else is
/// wrapped in backticks with backslashes escaped. Empty names, backticks and
/// control characters cannot be carried and are rejected.
pub fn quote_identifier(name: &str) -> Result<String, SchemaError> {
    let unrepresentable = |reason: &str| SchemaError::UnrepresentableName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(unrepresentable("empty name"));
    }
    if is_bare_identifier(name) {
        return Ok(name.to_string());
    }
    if name.contains('`') {
        return Err(unrepresentable("contains a backtick"));
    }
    if name.chars().any(char::is_control) {
        return Err(unrepresentable("contains a control character"));
    }
    Ok(format!("`{}`", name.replace('\\', "\\\\")))
}

/// `database.table`, each part quoted.
pub fn qualified_table_name(database: &str, table: &str) -> Result<String, SchemaError> {
    Ok(format!(
        "{}.{}",
        quote_identifier(database)?,
        quote_identifier(table)?
    ))
}

/// Map source columns onto destination column definitions, one per column,
/// in the same order. Fails on the first name that cannot be quoted.
pub fn map_to_destination_columns(
    columns: &[ColumnDescriptor],
) -> Result<Vec<DestinationColumnDef>, SchemaError> {
    let ddl = ClickHouseDdl;
    columns
        .iter()
        .map(|column| {
            quote_identifier(&column.name)?;
            Ok(DestinationColumnDef {
                name: column.name.clone(),
                column_type: ddl.to_ddl(column.inferred_type, column.nullable),
            })
        })
        .collect()
}

/// Generate an idempotent `CREATE TABLE` statement.
pub fn create_table_statement(
    database: &str,
    table: &str,
    columns: &[DestinationColumnDef],
) -> Result<String, SchemaError> {
    if columns.is_empty() {
        return Err(SchemaError::NoColumns(table.to_string()));
    }
    let column_defs = columns
        .iter()
        .map(DestinationColumnDef::to_sql)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE = MergeTree() ORDER BY tuple()",
        qualified_table_name(database, table)?,
        column_defs.join(", ")
    ))
}

/// `INSERT ... FORMAT JSONEachRow` header; the rows follow in the body.
pub fn insert_statement(
    database: &str,
    table: &str,
    column_names: &[String],
) -> Result<String, SchemaError> {
    if column_names.is_empty() {
        return Err(SchemaError::NoColumns(table.to_string()));
    }
    let quoted = column_names
        .iter()
        .map(|name| quote_identifier(name))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(format!(
        "INSERT INTO {} ({}) FORMAT JSONEachRow",
        qualified_table_name(database, table)?,
        quoted.join(", ")
    ))
}

/// `SELECT` of the given columns, in order, with an optional row limit.
pub fn select_statement(
    database: &str,
    table: &str,
    column_names: &[String],
    limit: Option<u64>,
) -> Result<String, SchemaError> {
    if column_names.is_empty() {
        return Err(SchemaError::NoColumns(table.to_string()));
    }
    let quoted = column_names
        .iter()
        .map(|name| quote_identifier(name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut sql = format!(
        "SELECT {} FROM {}",
        quoted.join(", "),
        qualified_table_name(database, table)?
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok(sql)
}
