use clap::Parser;

use crate::command::StateCommand;

#[derive(Parser)]
#[command(
    name = "atomic-state",
    version,
    about = "Crash-safe writes and all-or-nothing transactions for JSON state files"
)]
pub struct StateCli {
    #[command(subcommand)]
    pub command: StateCommand,
}
