//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod init_session;
pub mod list_groups;
pub mod relay;

pub use relay::RunOptions;
