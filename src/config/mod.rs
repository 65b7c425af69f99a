//! Configuration helpers shared by the CLI commands.

mod duration;
mod transfer_file;

pub use duration::parse_duration;
pub use transfer_file::TransferFile;
