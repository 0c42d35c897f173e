pub mod apply;
pub mod update;
pub mod write;

use clap::Subcommand;

use crate::error::Result;

#[derive(Subcommand)]
pub enum StateCommand {
    /// Atomically replace (or create) a file.
    Write(write::WriteArgs),
    /// Print a file decoded with the given encoding.
    Read(write::ReadArgs),
    /// Atomically apply named transforms to a JSON state file.
    Update(update::UpdateArgs),
    /// Apply a JSON batch of writes as one all-or-nothing transaction.
    Apply(apply::ApplyArgs),
    /// Move a record between two JSON state files in one transaction.
    Move(apply::MoveArgs),
}

impl StateCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            StateCommand::Write(args) => write::execute(args),
            StateCommand::Read(args) => write::read(args),
            StateCommand::Update(args) => update::execute(args),
            StateCommand::Apply(args) => apply::execute(args),
            StateCommand::Move(args) => apply::relocate(args),
        }
    }
}
