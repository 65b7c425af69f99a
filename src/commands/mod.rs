//! Handlers behind each CLI subcommand.
//!
//! - `inspect`: read-only commands (schema inference, previews, metadata)
//! - `transfer`: import, export and YAML-described transfers

pub mod inspect;
pub mod transfer;

use serde::Serialize;

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
