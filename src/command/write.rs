use crate::error::{Result, StateError};
use crate::fs::{Content, Encoding, WriteOptions, atomic_write, parse_mode, read_text};

use clap::Parser;
use colored::Colorize;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Arguments for the `write` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct WriteArgs {
    /// File to write; its parent directory must exist
    pub path: PathBuf,

    /// Content to write (read from stdin when omitted)
    pub content: Option<String>,

    /// Text encoding of the written file
    #[arg(long, short = 'e', default_value = "utf-8")]
    pub encoding: Encoding,

    /// Permission bits in octal, e.g. 600
    #[arg(long, short = 'm', value_parser = parse_mode)]
    pub mode: Option<u32>,
}

/// Arguments for the `read` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ReadArgs {
    /// File to read
    pub path: PathBuf,

    /// Text encoding of the file
    #[arg(long, short = 'e', default_value = "utf-8")]
    pub encoding: Encoding,
}

pub fn execute(args: WriteArgs) -> Result<()> {
    let content = match args.content {
        Some(text) => Content::Text(text),
        None => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .map_err(|e| StateError::io("<stdin>", e))?;
            // Piped input is taken as UTF-8 text so --encoding can re-encode it.
            match String::from_utf8(bytes) {
                Ok(text) => Content::Text(text),
                Err(e) => Content::Bytes(e.into_bytes()),
            }
        }
    };

    let options = WriteOptions {
        encoding: args.encoding,
        mode: args.mode,
    };
    let size = content.to_bytes(args.encoding)?.len();
    atomic_write(&args.path, content, &options)?;

    println!(
        "{:>12} {} ({} bytes, {})",
        "Wrote".green().bold(),
        args.path.display(),
        size,
        args.encoding
    );
    Ok(())
}

pub fn read(args: ReadArgs) -> Result<()> {
    let text = read_text(&args.path, args.encoding)?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|e| StateError::io("<stdout>", e))
}
