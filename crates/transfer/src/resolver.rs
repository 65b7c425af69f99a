//! Resolves what a transfer reads and writes before the first batch.
//!
//! Imports take their column names from the file header and their types
//! from the destination table, which may first be created from a fresh
//! inference sample. Exports read the selected columns of a
//! table, or pass a raw query through and take whatever columns it returns.

use crate::engine::with_timeout;
use crate::request::ExportQuery;
use clickhouse_sink::{StoreAdapter, StoreQuery, StoreRowStream};
use clickhouse_types::map_to_destination_columns;
use csv_types::{infer_columns, Delimiter, DEFAULT_SAMPLE_ROWS};
use flatfile_sync_file::{read_delimited_sample, FileSource};
use std::time::Duration;
use sync_core::{
    map_to_source_projection, ColumnDescriptor, ColumnSelection, SchemaError, TransferError,
};
use tracing::{info, warn};

/// Expand `selection` against a file header.
pub fn select_header_columns(
    selection: &ColumnSelection,
    headers: &[String],
    source_name: &str,
) -> Result<Vec<String>, SchemaError> {
    match selection {
        ColumnSelection::All => Ok(headers.to_vec()),
        ColumnSelection::Named(names) => names
            .iter()
            .map(|name| {
                if headers.contains(name) {
                    Ok(name.clone())
                } else {
                    Err(SchemaError::ColumnNotFound {
                        column: name.clone(),
                        context: format!("the header of {source_name}"),
                    })
                }
            })
            .collect(),
    }
}

/// Columns an import writes, in selection order.
///
/// With `create_table` the table is first created, if absent, from types
/// inferred on a sample of the file, with every column nullable. The write
/// columns always come from the destination's schema, which must have every
/// selected column.
#[allow(clippy::too_many_arguments)]
pub async fn resolve_import_columns<A>(
    store: &A,
    source: &FileSource,
    delimiter: Delimiter,
    headers: &[String],
    table: &str,
    selection: &ColumnSelection,
    create_table: bool,
    io_timeout: Duration,
) -> Result<Vec<ColumnDescriptor>, TransferError>
where
    A: StoreAdapter + ?Sized,
{
    let source_name = source.display_name();
    let names = select_header_columns(selection, headers, &source_name)?;
    let selection = ColumnSelection::Named(names);

    if create_table {
        let (sample_headers, sample) = with_timeout("schema sample", io_timeout, async {
            Ok::<_, TransferError>(
                read_delimited_sample(source, delimiter, DEFAULT_SAMPLE_ROWS).await?,
            )
        })
        .await?;
        let inferred = infer_columns(&sample_headers, &sample);
        // Rows past the sample may still be empty in any column
        let columns: Vec<ColumnDescriptor> =
            map_to_source_projection(&selection, &inferred, &source_name)?
                .into_iter()
                .map(|column| ColumnDescriptor {
                    nullable: true,
                    ..column
                })
                .collect();
        let definitions = map_to_destination_columns(&columns)?;

        info!(
            "Creating table {table} if absent ({} columns inferred from {} sample rows)",
            definitions.len(),
            sample.len()
        );
        let create = store.create_table(table, &definitions);
        with_timeout("create table", io_timeout, create).await?;
    }

    // A table that already existed keeps its own types
    let schema = with_timeout("schema fetch", io_timeout, store.fetch_schema(table)).await?;
    Ok(map_to_source_projection(
        &selection,
        &schema,
        &format!("table '{table}'"),
    )?)
}

/// Run the store side of an export and return its row stream.
pub async fn open_export_stream<A>(
    store: &A,
    query: &ExportQuery,
    io_timeout: Duration,
) -> Result<StoreRowStream, TransferError>
where
    A: StoreAdapter + ?Sized,
{
    let store_query = match query {
        ExportQuery::Table { table, selection } => {
            let fetch = store.fetch_schema(table);
            let schema = with_timeout("schema fetch", io_timeout, fetch).await?;
            let context = format!("table '{table}'");
            let columns = map_to_source_projection(selection, &schema, &context)?;
            StoreQuery::Table {
                table: table.clone(),
                columns: columns.into_iter().map(|c| c.name).collect(),
            }
        }
        ExportQuery::Raw {
            sql,
            ignored_selection,
        } => {
            if ignored_selection.is_explicit() {
                warn!("Column selection is ignored for raw queries; exporting all result columns");
            }
            StoreQuery::Raw(sql.clone())
        }
    };

    let stream = with_timeout("query", io_timeout, store.query_rows(&store_query, None)).await?;
    if stream.columns().is_empty() {
        return Err(TransferError::SourceRead(
            "Query result has no columns".to_string(),
        ));
    }
    Ok(stream)
}
