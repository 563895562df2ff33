// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Re-insert identity columns into generated founders.
//!
//! Aligned inputs are typically stripped of the columns on which all rows
//! agree before founder generation; this tool restores them afterwards from a
//! reference sequence and the recorded `0`/`1` column mask.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use founder_sequences::identity::{insert_identity_columns, parse_identity_mask};

/// Insert identity columns into founder sequences.
#[derive(Debug, Parser)]
#[command(name = "insert-identity-columns", version, about)]
struct Args {
    /// Sequences without identity columns, one per line.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,

    /// Reference sequence carrying the aligned (full) columns.
    #[arg(long, value_name = "PATH")]
    reference: PathBuf,

    /// The identity column mask, `0`/`1` per aligned position.
    #[arg(long, value_name = "PATH")]
    identity_columns: PathBuf,

    /// Write the restored sequences here instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn read_lines(path: &Path) -> anyhow::Result<Vec<Vec<u8>>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut rows = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let row = line.trim_end_matches('\r');
        if !row.is_empty() {
            rows.push(row.as_bytes().to_vec());
        }
    }
    Ok(rows)
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let rows = read_lines(&args.input)?;
    let reference = read_lines(&args.reference)?
        .into_iter()
        .next()
        .context("the reference file is empty")?;
    let mask_bytes = std::fs::read(&args.identity_columns)
        .with_context(|| format!("cannot open {}", args.identity_columns.display()))?;
    let mask = parse_identity_mask(&mask_bytes)?;

    let restored = insert_identity_columns(&rows, &reference, &mask)?;

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("cannot create {}", path.display())
        })?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    for row in restored {
        writer.write_all(&row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
