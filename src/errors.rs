// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types shared by all stages of the founder generation pipeline.
//!
//! Errors are never recovered locally; they bubble up to the caller (usually
//! the command line binary), which reports them on stderr and exits with a
//! non-zero status.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The input could not be interpreted as an equal-length sequence matrix.
    #[error("malformed input: {0}")]
    InputMalformed(String),

    /// The requested configuration is contradictory or out of range.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A stored segmentation does not reduce the presented input.
    #[error("segmentation is not reductive: {0}")]
    NotReducible(String),

    /// A PBWT context was asked to step past the end of the sequences.
    #[error("PBWT column {column} out of range for sequence length {length}")]
    ColumnOutOfRange { column: u32, length: u32 },

    /// An internal invariant was violated; this indicates a bug.
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
