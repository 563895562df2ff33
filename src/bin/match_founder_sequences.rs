// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Match original sequences back onto a generated founder set and report the
//! maximal matching ranges per sequence.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use founder_sequences::io::read::{read_sequences, InputFormat};
use founder_sequences::matcher::match_all_and_report;
use founder_sequences::matrix::SequenceMatrix;
use founder_sequences::scheduler::{Inline, Scheduler, WorkStealing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormatArg {
    #[value(name = "FASTA")]
    Fasta,
    #[value(name = "list-file")]
    ListFile,
}

/// Match sequences to founder sequences.
#[derive(Debug, Parser)]
#[command(name = "match-founder-sequences", version, about)]
struct Args {
    /// The original sequences.
    #[arg(long, value_name = "PATH")]
    sequences: PathBuf,

    /// Layout of the sequence input.
    #[arg(long, value_enum, default_value = "FASTA")]
    input_format: InputFormatArg,

    /// Founder sequences, one per line.
    #[arg(long, value_name = "PATH")]
    founders: PathBuf,

    /// Write the report here instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Run everything on the calling thread.
    #[arg(long)]
    single_threaded: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let input_format = match args.input_format {
        InputFormatArg::Fasta => InputFormat::Fasta,
        InputFormatArg::ListFile => InputFormat::ListFile,
    };
    let sequences = read_sequences(&args.sequences, input_format)?;

    let founders = {
        let file = File::open(&args.founders)
            .with_context(|| format!("cannot open {}", args.founders.display()))?;
        let mut rows = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let row = line.trim_end_matches('\r');
            if !row.is_empty() {
                rows.push(row.as_bytes().to_vec());
            }
        }
        SequenceMatrix::new(rows)?
    };

    let scheduler: Box<dyn Scheduler> = if args.single_threaded {
        Box::new(Inline)
    } else {
        Box::new(WorkStealing::new(None)?)
    };

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("cannot create {}", path.display())
        })?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    match_all_and_report(&sequences, &founders, scheduler.as_ref(), writer.as_mut())?;
    Ok(())
}
