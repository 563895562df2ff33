// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Identity-column pre- and post-processing.
//!
//! Columns on which every input row agrees carry no haplotype information;
//! removing them before segmentation shrinks the effective column count and
//! speeds up the PBWT pass. The removed columns are recorded as a `0`/`1`
//! mask (`1` marks an identity column) so they can be re-inserted into the
//! generated founders from a reference sequence afterwards.
//!
//! # Example
//!
//! ```
//! use founder_sequences::identity::{identity_column_mask, insert_identity_columns, remove_identity_columns};
//! use founder_sequences::matrix::SequenceMatrix;
//!
//! let matrix = SequenceMatrix::new(vec![
//!     b"AACGA".to_vec(),
//!     b"AATGA".to_vec(),
//! ])
//! .unwrap();
//! let mask = identity_column_mask(&matrix);
//! assert_eq!(mask, vec![true, true, false, true, true]);
//!
//! let (reduced, mask) = remove_identity_columns(&matrix).unwrap();
//! assert_eq!(reduced.n_cols(), 1);
//!
//! // Re-insert from a reference carrying the identity columns.
//! let rows = vec![b"C".to_vec(), b"T".to_vec()];
//! let restored = insert_identity_columns(&rows, b"AACGA", &mask).unwrap();
//! assert_eq!(restored[0], b"AACGA");
//! assert_eq!(restored[1], b"AATGA");
//! ```

use crate::errors::{Error, Result};
use crate::matrix::SequenceMatrix;

/// Mark the columns on which all rows hold the same symbol.
pub fn identity_column_mask(matrix: &SequenceMatrix) -> Vec<bool> {
    let first = matrix.row(0);
    (0..matrix.n_cols())
        .map(|col| matrix.rows().all(|row| row[col] == first[col]))
        .collect()
}

/// Drop all identity columns, returning the reduced matrix and the mask
/// needed to restore them.
///
/// Fails when every column is an identity column; there is nothing left to
/// segment then, and the founder is the input row itself.
pub fn remove_identity_columns(matrix: &SequenceMatrix) -> Result<(SequenceMatrix, Vec<bool>)> {
    let mask = identity_column_mask(matrix);
    if mask.iter().all(|&m| m) {
        return Err(Error::InputMalformed(
            "all columns are identity columns; the single distinct row is its own founder"
                .to_owned(),
        ));
    }
    let rows = matrix
        .rows()
        .map(|row| {
            row.iter()
                .zip(&mask)
                .filter(|(_, &is_identity)| !is_identity)
                .map(|(&c, _)| c)
                .collect()
        })
        .collect();
    Ok((SequenceMatrix::new(rows)?, mask))
}

/// Re-insert identity columns into `rows`: wherever the mask holds `1` the
/// reference symbol at that aligned position is taken, otherwise the next
/// symbol of the row.
///
/// `reference` and `mask` cover the aligned (full) positions; every row must
/// have exactly as many symbols as the mask has `0` entries.
pub fn insert_identity_columns(
    rows: &[Vec<u8>],
    reference: &[u8],
    mask: &[bool],
) -> Result<Vec<Vec<u8>>> {
    if reference.len() != mask.len() {
        return Err(Error::InputMalformed(format!(
            "reference length {} does not match the mask length {}",
            reference.len(),
            mask.len()
        )));
    }
    let reduced_len = mask.iter().filter(|&&m| !m).count();

    let mut out = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        if row.len() != reduced_len {
            return Err(Error::InputMalformed(format!(
                "row {} has {} symbols but the mask leaves {} non-identity columns",
                idx,
                row.len(),
                reduced_len
            )));
        }
        let mut restored = Vec::with_capacity(mask.len());
        let mut src = row.iter();
        for (aligned_pos, &is_identity) in mask.iter().enumerate() {
            if is_identity {
                restored.push(reference[aligned_pos]);
            } else {
                restored.push(*src.next().expect("row length checked above"));
            }
        }
        out.push(restored);
    }
    Ok(out)
}

/// Parse a `0`/`1` mask line, ignoring a trailing newline.
pub fn parse_identity_mask(text: &[u8]) -> Result<Vec<bool>> {
    text.iter()
        .take_while(|&&c| c != b'\n')
        .map(|&c| match c {
            b'0' => Ok(false),
            b'1' => Ok(true),
            other => Err(Error::InputMalformed(format!(
                "unexpected character {:?} in the identity column mask",
                other as char
            ))),
        })
        .collect()
}
