#![doc = include_str!("../README.md")]

pub mod cli;
pub mod command;
pub mod error;
pub mod fs;
pub mod lock;
pub mod ops;
pub mod validation;

pub use error::*;
pub use fs::{atomic_update, atomic_write, multi_write};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() -> Result<()> {
    use clap::Parser;

    let cli = cli::StateCli::parse();
    cli.command.execute()
}
