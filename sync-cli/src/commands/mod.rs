//! CLI command implementations.

pub mod check;
pub mod export;
pub mod import;
pub mod init;
pub mod status;
pub mod sync;
pub mod watch;
