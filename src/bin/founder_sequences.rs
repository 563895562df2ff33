// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Command line interface for founder sequence generation.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use founder_sequences::io::read::{read_sequences, InputFormat};
use founder_sequences::join::{BipartiteSetScoring, SegmentJoining};
use founder_sequences::pipeline::{generate, GenerateConfig};
use founder_sequences::segmentation::container::SegmentationContainer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormatArg {
    #[value(name = "FASTA")]
    Fasta,
    #[value(name = "list-file")]
    ListFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SegmentJoiningArg {
    Greedy,
    BipartiteMatching,
    Random,
    PbwtOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BipartiteSetScoringArg {
    SymmetricDifference,
    Intersection,
}

/// Generate founder sequences from a multiple sequence alignment.
#[derive(Debug, Parser)]
#[command(name = "founder-sequences", version, about)]
struct Args {
    /// Input file with the aligned, equal-length sequences.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,

    /// Layout of the input file.
    #[arg(long, value_enum, default_value = "FASTA")]
    input_format: InputFormatArg,

    /// Minimum segment length L.
    #[arg(long, value_name = "INT", value_parser = clap::value_parser!(u32).range(1..))]
    segment_length_bound: u32,

    /// How substrings of adjacent segments are joined into founders.
    #[arg(long, value_enum, default_value = "pbwt-order")]
    segment_joining: SegmentJoiningArg,

    /// Edge scoring for bipartite matching.
    #[arg(long, value_enum)]
    bipartite_set_scoring: Option<BipartiteSetScoringArg>,

    /// Multiplier for the PBWT sample cadence √n; 0 disables sampling.
    #[arg(long, value_name = "INT", default_value_t = 1)]
    pbwt_sample_rate: u32,

    /// Seed for the random segment joining.
    #[arg(long, value_name = "UINT32", default_value_t = 0)]
    random_seed: u32,

    /// Run everything on the calling thread.
    #[arg(long)]
    single_threaded: bool,

    /// Write the founders here instead of stdout.
    #[arg(long, value_name = "PATH")]
    output_founders: Option<PathBuf>,

    /// Write the segment listing to this path, or "-" for stdout.
    #[arg(long, value_name = "PATH")]
    output_segments: Option<String>,

    /// Reuse a previously stored segmentation instead of recomputing it.
    #[arg(long, value_name = "PATH")]
    input_segmentation: Option<PathBuf>,

    /// Store the computed segmentation here.
    #[arg(long, value_name = "PATH")]
    output_segmentation: Option<PathBuf>,

    /// Echo the invocation to stderr.
    #[arg(long)]
    print_invocation: bool,
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

    if args.print_invocation {
        let invocation: Vec<String> = std::env::args().collect();
        eprintln!("Invocation: {}", invocation.join(" "));
    }

    if args.bipartite_set_scoring.is_some()
        && args.segment_joining != SegmentJoiningArg::BipartiteMatching
    {
        bail!("--bipartite-set-scoring requires --segment-joining bipartite-matching");
    }

    let input_format = match args.input_format {
        InputFormatArg::Fasta => InputFormat::Fasta,
        InputFormatArg::ListFile => InputFormat::ListFile,
    };
    let matrix = read_sequences(&args.input, input_format)?;

    let stored = match &args.input_segmentation {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open segmentation {}", path.display()))?;
            let container = SegmentationContainer::read(&mut BufReader::new(file))?;
            if container.segment_length != args.segment_length_bound {
                warn!(
                    stored = container.segment_length,
                    requested = args.segment_length_bound,
                    "stored segmentation was computed with a different segment length bound"
                );
            }
            if !container.input_path.is_empty()
                && container.input_path != args.input.display().to_string()
            {
                warn!(
                    stored = %container.input_path,
                    "stored segmentation names a different input path"
                );
            }
            Some(container)
        }
        None => None,
    };

    let config = GenerateConfig {
        segment_length: args.segment_length_bound,
        joining: match args.segment_joining {
            SegmentJoiningArg::Greedy => SegmentJoining::Greedy,
            SegmentJoiningArg::BipartiteMatching => SegmentJoining::BipartiteMatching,
            SegmentJoiningArg::Random => SegmentJoining::Random,
            SegmentJoiningArg::PbwtOrder => SegmentJoining::PbwtOrder,
        },
        set_scoring: match args.bipartite_set_scoring {
            Some(BipartiteSetScoringArg::Intersection) => BipartiteSetScoring::Intersection,
            _ => BipartiteSetScoring::SymmetricDifference,
        },
        pbwt_sample_rate: args.pbwt_sample_rate,
        random_seed: args.random_seed,
        single_threaded: args.single_threaded,
    };

    let mut founders: Box<dyn Write> = match &args.output_founders {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("cannot create {}", path.display())
        })?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    let mut segments: Option<Box<dyn Write>> = match args.output_segments.as_deref() {
        Some("-") => Some(Box::new(BufWriter::new(std::io::stdout()))),
        Some(path) => Some(Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path))?,
        ))),
        None => None,
    };

    let progress = |done: u64, _total: u64| {
        if done > 0 && done % 100_000 == 0 {
            eprint!(" {}", done);
        }
    };

    let outcome = generate(
        &matrix,
        &config,
        &progress,
        founders.as_mut(),
        segments.as_mut().map(|writer| writer.as_mut() as &mut dyn Write),
        stored.as_ref(),
        &args.input.display().to_string(),
    )?;

    if let Some(path) = &args.output_segmentation {
        let mut writer = BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        );
        outcome.segmentation.write(&mut writer)?;
    }

    info!(
        founders = outcome.founder_count,
        segments = outcome.segment_count,
        "done"
    );
    Ok(())
}
