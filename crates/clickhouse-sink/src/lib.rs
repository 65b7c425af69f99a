//! ClickHouse store adapter.
//!
//! This crate defines the `StoreAdapter` trait the transfer engine talks to,
//! and `ClickHouseStore`, its implementation over the ClickHouse HTTP
//! interface. The trait speaks sync-core types (`ColumnDescriptor`, `Row`)
//! so transfer code never touches ClickHouse wire formats.

mod client;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
mod opts;
mod stream;
mod traits;

pub use client::ClickHouseStore;
pub use opts::{ClickHouseOpts, DEFAULT_CONNECT_TIMEOUT};
pub use stream::{CompactRow, StoreRowStream};
pub use traits::{StoreAdapter, StoreQuery};
