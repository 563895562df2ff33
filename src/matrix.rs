// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The read-only sequence matrix the whole pipeline operates on: N rows of
//! equal length n over a small alphabet.
//!
//! # Example
//!
//! ```
//! use founder_sequences::matrix::SequenceMatrix;
//!
//! let matrix = SequenceMatrix::new(vec![
//!     b"ACGT".to_vec(),
//!     b"AGGT".to_vec(),
//! ])
//! .unwrap();
//! assert_eq!(matrix.n_rows(), 2);
//! assert_eq!(matrix.n_cols(), 4);
//! assert_eq!(matrix.row(1), b"AGGT");
//! ```

use crate::errors::{Error, Result};

/// An immutable matrix of equal-length sequences.
///
/// All rows are validated to share the same length at construction time;
/// afterwards the matrix is only ever borrowed.
#[derive(Debug, Clone)]
pub struct SequenceMatrix {
    rows: Vec<Vec<u8>>,
    len: usize,
}

impl SequenceMatrix {
    /// Build a matrix from the given rows.
    ///
    /// Fails with `Error::InputMalformed` if no rows are given or if the rows
    /// do not share a common length.
    pub fn new(rows: Vec<Vec<u8>>) -> Result<Self> {
        let first = match rows.first() {
            Some(row) => row.len(),
            None => {
                return Err(Error::InputMalformed(
                    "the input contained no sequences".to_owned(),
                ))
            }
        };
        if first == 0 {
            return Err(Error::InputMalformed("sequences must be non-empty".to_owned()));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != first {
                return Err(Error::InputMalformed(format!(
                    "the length of the sequence at index {} was {} while that of the first one was {}",
                    i,
                    row.len(),
                    first
                )));
            }
        }
        Ok(SequenceMatrix { rows, len: first })
    }

    /// Number of sequences (rows).
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Common sequence length (columns).
    pub fn n_cols(&self) -> usize {
        self.len
    }

    /// Borrow a single row.
    pub fn row(&self, idx: usize) -> &[u8] {
        &self.rows[idx]
    }

    /// Borrow the substring of `row` on the column range `[lb, rb)`.
    pub fn substring(&self, row: usize, lb: usize, rb: usize) -> &[u8] {
        &self.rows[row][lb..rb]
    }

    /// Iterate over all rows.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.rows.iter().map(|r| r.as_slice())
    }
}
