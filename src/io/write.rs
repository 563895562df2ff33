// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Writing founder rows and segment listings.
//!
//! Founder rows are assembled from per-segment substring slices of the input
//! matrix; a founder line is exactly n bytes plus a newline, with `-` filling
//! unmatched slots. Segment listings are tab-separated, in one of two layouts
//! depending on whether a matcher produced the segments (greedy, bipartite)
//! or a copy-number list did (PBWT order, random).

use std::io::Write;

use itertools::Itertools;

use crate::errors::Result;
use crate::matrix::SequenceMatrix;
use crate::segmentation::DpCell;

/// The gap character filling unmatched founder slots.
pub const GAP: u8 = b'-';

/// Write the substring of `row` on `[lb, rb)`.
pub fn write_substring<W: Write + ?Sized>(
    writer: &mut W,
    matrix: &SequenceMatrix,
    row: u32,
    lb: u32,
    rb: u32,
) -> Result<()> {
    writer.write_all(matrix.substring(row as usize, lb as usize, rb as usize))?;
    Ok(())
}

/// Write `len` gap characters.
pub fn write_gaps<W: Write + ?Sized>(writer: &mut W, len: u32) -> Result<()> {
    for _ in 0..len {
        writer.write_all(&[GAP])?;
    }
    Ok(())
}

/// One line of a matcher-backed segment listing.
#[derive(Debug, Clone)]
pub struct SegmentListingEntry {
    /// Row whose slice spells the subsequence.
    pub text_row: u32,
    /// Input rows carrying this subsequence, ascending; empty for copies.
    pub rows: Vec<u32>,
    /// Index of the source entry when this one is a padding copy.
    pub copied_from: Option<u32>,
}

/// Listing for the copy-number joiners (PBWT order, random):
/// `SEGMENT LB RB SIZE SUBSEQUENCE_NUMBER COPY_NUMBER SUBSEQUENCE`.
///
/// `copy_numbers` holds, per segment, `(substring row, cumulative copy
/// number)` pairs as produced by the joining stage.
pub fn write_copy_number_segments<W: Write + ?Sized>(
    writer: &mut W,
    matrix: &SequenceMatrix,
    cells: &[DpCell],
    copy_numbers: &[Vec<(u32, u32)>],
) -> Result<()> {
    writeln!(
        writer,
        "SEGMENT\tLB\tRB\tSIZE\tSUBSEQUENCE_NUMBER\tCOPY_NUMBER\tSUBSEQUENCE"
    )?;
    for (segment_idx, (cell, entries)) in cells.iter().zip(copy_numbers).enumerate() {
        let mut prev_cumulative = 0;
        for &(substring_idx, cumulative) in entries {
            write!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t",
                segment_idx,
                cell.lb,
                cell.rb,
                cell.segment_size,
                substring_idx,
                cumulative - prev_cumulative
            )?;
            prev_cumulative = cumulative;
            write_substring(writer, matrix, substring_idx, cell.lb, cell.rb)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Listing for the matcher-backed joiners (greedy, bipartite):
/// `SEGMENT LB RB SIZE SUBSEQUENCE SEQUENCES COPIED_FROM`.
pub fn write_matcher_segments<W: Write + ?Sized>(
    writer: &mut W,
    matrix: &SequenceMatrix,
    cells: &[DpCell],
    listings: &[Vec<SegmentListingEntry>],
) -> Result<()> {
    writeln!(
        writer,
        "SEGMENT\tLB\tRB\tSIZE\tSUBSEQUENCE\tSEQUENCES\tCOPIED_FROM"
    )?;
    for (segment_idx, (cell, entries)) in cells.iter().zip(listings).enumerate() {
        for entry in entries {
            write!(
                writer,
                "{}\t{}\t{}\t{}\t",
                segment_idx, cell.lb, cell.rb, cell.segment_size
            )?;
            write_substring(writer, matrix, entry.text_row, cell.lb, cell.rb)?;
            let rows = entry.rows.iter().map(|r| r.to_string()).join(",");
            let copied = match entry.copied_from {
                Some(src) => src.to_string(),
                None => "-".to_owned(),
            };
            writeln!(writer, "\t{}\t{}", rows, copied)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> SequenceMatrix {
        SequenceMatrix::new(vec![b"ACGT".to_vec(), b"AGGT".to_vec()]).unwrap()
    }

    #[test]
    fn test_write_substring_and_gaps() {
        let m = matrix();
        let mut out = Vec::new();
        write_substring(&mut out, &m, 1, 1, 3).unwrap();
        write_gaps(&mut out, 3).unwrap();
        assert_eq!(out, b"GG---");
    }

    #[test]
    fn test_copy_number_listing_layout() {
        let m = matrix();
        let cells = vec![DpCell::new(0, 4, 2, 2)];
        let copy_numbers = vec![vec![(0u32, 1u32), (1, 2)]];
        let mut out = Vec::new();
        write_copy_number_segments(&mut out, &m, &cells, &copy_numbers).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "SEGMENT\tLB\tRB\tSIZE\tSUBSEQUENCE_NUMBER\tCOPY_NUMBER\tSUBSEQUENCE"
        );
        assert_eq!(lines[1], "0\t0\t4\t2\t0\t1\tACGT");
        assert_eq!(lines[2], "0\t0\t4\t2\t1\t1\tAGGT");
    }

    #[test]
    fn test_matcher_listing_layout() {
        let m = matrix();
        let cells = vec![DpCell::new(0, 4, 2, 2)];
        let listings = vec![vec![
            SegmentListingEntry {
                text_row: 0,
                rows: vec![0],
                copied_from: None,
            },
            SegmentListingEntry {
                text_row: 1,
                rows: vec![],
                copied_from: Some(0),
            },
        ]];
        let mut out = Vec::new();
        write_matcher_segments(&mut out, &m, &cells, &listings).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "0\t0\t4\t2\tACGT\t0\t-");
        assert_eq!(lines[2], "0\t0\t4\t2\tAGGT\t\t0");
    }
}
