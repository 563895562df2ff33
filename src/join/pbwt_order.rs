// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! PBWT-order joining: founder row `r` takes, in every segment, the
//! substring whose cumulative copy-number range contains `r`. Because the
//! copy-number lists keep the PBWT rank order, neighbouring founders stay
//! close in prefix order, which keeps recombinations between similar rows.

use std::io::Write;

use crate::errors::Result;
use crate::io::write::write_substring;
use crate::matrix::SequenceMatrix;
use crate::segmentation::DpCell;

use super::SubstringCopyNumber;

/// Emit the K founder rows by advancing one cursor per segment through its
/// cumulative copy-number list.
pub fn output_founders(
    writer: &mut dyn Write,
    matrix: &SequenceMatrix,
    cells: &[DpCell],
    copy_numbers: &[Vec<SubstringCopyNumber>],
    k: u32,
) -> Result<()> {
    let mut cursors = vec![0usize; copy_numbers.len()];
    for row in 0..k {
        for ((cell, cn), cursor) in cells.iter().zip(copy_numbers).zip(cursors.iter_mut()) {
            // The stored copy numbers are running sums.
            if row == cn[*cursor].copy_number {
                *cursor += 1;
            }
            debug_assert!(row < cn[*cursor].copy_number);
            write_substring(writer, matrix, cn[*cursor].substring_idx, cell.lb, cell.rb)?;
        }
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
