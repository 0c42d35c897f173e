use crate::error::Result;
use crate::ops::{Transform, apply_transforms};

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

/// Arguments for the `update` subcommand.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct UpdateArgs {
    /// JSON state file to update
    pub path: PathBuf,

    /// Transform to apply, in order (repeatable)
    ///
    /// Examples:
    ///   --apply set:phase=review        Set a key (value parsed as JSON, else string)
    ///   --apply remove:owner            Remove a key
    ///   --apply 'merge:{"a":1}'         Shallow-merge an object
    ///   --apply 'append:log="done"'     Push onto an array
    #[arg(
        long = "apply",
        short = 'a',
        value_name = "TRANSFORM",
        required = true,
        verbatim_doc_comment
    )]
    pub transforms: Vec<String>,

    /// Treat a missing file as an empty document
    #[arg(long)]
    pub create_if_missing: bool,
}

pub fn execute(args: UpdateArgs) -> Result<()> {
    // Resolve every transform before the file is read.
    let transforms = args
        .transforms
        .iter()
        .map(|spec| spec.parse::<Transform>())
        .collect::<Result<Vec<_>>>()?;

    log::debug!(
        "Applying {} transform(s) to {}",
        transforms.len(),
        args.path.display()
    );

    apply_transforms(&args.path, &transforms, args.create_if_missing)?;

    println!(
        "{:>12} {} ({} transform{})",
        "Updated".green().bold(),
        args.path.display(),
        transforms.len(),
        if transforms.len() == 1 { "" } else { "s" }
    );
    Ok(())
}
