//! Multi-file commands: batch apply and record moves.
//!
//! Both go through a single transaction, optionally under an advisory lock.

use crate::error::{Result, StateError};
use crate::fs::Transaction;
use crate::lock::StateLock;
use crate::ops::{move_record, parse_batch};

use clap::Parser;
use colored::Colorize;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Arguments for the `apply` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ApplyArgs {
    /// JSON batch file, or `-` for stdin
    pub batch: PathBuf,

    /// Validate and show what would change without writing
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Hold an exclusive lock on this file while applying
    #[arg(long, value_name = "PATH")]
    pub lock: Option<PathBuf>,
}

/// Arguments for the `move` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct MoveArgs {
    /// Key of the record to move
    pub key: String,

    /// State file the record is taken from
    #[arg(long, value_name = "PATH")]
    pub from: PathBuf,

    /// State file the record is added to (created if missing)
    #[arg(long, value_name = "PATH")]
    pub to: PathBuf,

    /// Hold an exclusive lock on this file while moving
    #[arg(long, value_name = "PATH")]
    pub lock: Option<PathBuf>,
}

fn read_batch(source: &Path) -> Result<String> {
    if source == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| StateError::io("<stdin>", e))?;
        Ok(text)
    } else {
        std::fs::read_to_string(source).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StateError::FileNotFound(source.to_path_buf()),
            _ => StateError::io(source, e),
        })
    }
}

fn take_lock(lock: Option<&Path>) -> Result<Option<StateLock>> {
    lock.map(|path| StateLock::acquire(path)).transpose()
}

pub fn execute(args: ApplyArgs) -> Result<()> {
    let text = read_batch(&args.batch)?;
    let requests = parse_batch(&text, &args.batch)?;

    let _lock = take_lock(args.lock.as_deref())?;

    let mut txn = Transaction::new(args.dry_run);
    for request in requests {
        txn.stage(request)?;
    }

    if let Err(e) = txn.commit() {
        if txn.is_rolled_back() {
            eprintln!("{}", "✓ Rollback successful.".green());
        }
        return Err(e);
    }

    let cwd = std::env::current_dir().map_err(|e| StateError::io(".", e))?;
    txn.print_summary(&cwd);
    Ok(())
}

pub fn relocate(args: MoveArgs) -> Result<()> {
    let _lock = take_lock(args.lock.as_deref())?;

    move_record(&args.from, &args.to, &args.key)?;

    println!(
        "{:>12} '{}' {} → {}",
        "Moved".green().bold(),
        args.key,
        args.from.display(),
        args.to.display().to_string().green()
    );
    Ok(())
}
