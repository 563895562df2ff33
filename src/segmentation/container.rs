// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Serialisation of a computed segmentation.
//!
//! Segmenting dominates the running time on large inputs while joining is
//! cheap, so the reduced traceback can be stored and reloaded to try several
//! joining disciplines without recomputing. The container is a little-endian
//! binary format:
//!
//! ```text
//! magic   b"FSEG"
//! u32     format version (currently 1)
//! u32     segment length bound L
//! u32     max segment size K
//! u32     sequence count N
//! u32     sequence length n
//! u32     σ, then σ bytes of alphabet symbols in rank order
//! u32     segment count, then per segment u32 lb, u32 rb, u32 size
//! u32     input path length, then that many bytes of the original path
//! ```
//!
//! The reader validates the magic, the version and the structural invariants
//! (coverage, bounds, ascending symbols) and leaves input compatibility
//! checks to the pipeline, which knows the presented matrix.

use std::io::{Read, Write};

use crate::alphabets::CompressedAlphabet;
use crate::errors::{Error, Result};
use crate::segmentation::DpCell;

const MAGIC: &[u8; 4] = b"FSEG";
const FORMAT_VERSION: u32 = 1;

/// A stored segmentation: everything needed to re-join without re-running
/// the DP, except the PBWT snapshots, which are cheap to replay.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationContainer {
    pub segment_length: u32,
    pub max_segment_size: u32,
    pub sequence_count: u32,
    pub sequence_length: u32,
    pub alphabet_symbols: Vec<u8>,
    pub cells: Vec<DpCell>,
    pub input_path: String,
}

impl SegmentationContainer {
    pub fn alphabet(&self) -> CompressedAlphabet {
        CompressedAlphabet::from_symbols(self.alphabet_symbols.clone())
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(MAGIC)?;
        write_u32(writer, FORMAT_VERSION)?;
        write_u32(writer, self.segment_length)?;
        write_u32(writer, self.max_segment_size)?;
        write_u32(writer, self.sequence_count)?;
        write_u32(writer, self.sequence_length)?;

        write_u32(writer, self.alphabet_symbols.len() as u32)?;
        writer.write_all(&self.alphabet_symbols)?;

        write_u32(writer, self.cells.len() as u32)?;
        for cell in &self.cells {
            write_u32(writer, cell.lb)?;
            write_u32(writer, cell.rb)?;
            write_u32(writer, cell.segment_size)?;
        }

        write_u32(writer, self.input_path.len() as u32)?;
        writer.write_all(self.input_path.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(|_| malformed("truncated header"))?;
        if &magic != MAGIC {
            return Err(malformed("bad magic, not a segmentation file"));
        }
        let version = read_u32(reader)?;
        if version != FORMAT_VERSION {
            return Err(Error::InputMalformed(format!(
                "unsupported segmentation format version {}",
                version
            )));
        }

        let segment_length = read_u32(reader)?;
        let max_segment_size = read_u32(reader)?;
        let sequence_count = read_u32(reader)?;
        let sequence_length = read_u32(reader)?;
        if segment_length == 0 || sequence_count == 0 || sequence_length == 0 {
            return Err(malformed("zero-sized dimensions"));
        }

        let sigma = read_u32(reader)? as usize;
        if sigma == 0 || sigma > 256 {
            return Err(malformed("implausible alphabet size"));
        }
        let mut alphabet_symbols = vec![0u8; sigma];
        reader
            .read_exact(&mut alphabet_symbols)
            .map_err(|_| malformed("truncated alphabet"))?;
        if !alphabet_symbols.windows(2).all(|w| w[0] < w[1]) {
            return Err(malformed("alphabet symbols must be strictly ascending"));
        }

        let cell_count = read_u32(reader)? as usize;
        if cell_count == 0 || cell_count > sequence_length as usize {
            return Err(malformed("implausible segment count"));
        }
        let mut cells = Vec::with_capacity(cell_count);
        for _ in 0..cell_count {
            let lb = read_u32(reader)?;
            let rb = read_u32(reader)?;
            let size = read_u32(reader)?;
            if lb >= rb || rb > sequence_length {
                return Err(malformed("segment bounds out of range"));
            }
            cells.push(DpCell::new(lb, rb, size, size));
        }
        if cells[0].lb != 0
            || cells[cells.len() - 1].rb != sequence_length
            || cells.windows(2).any(|w| w[0].rb != w[1].lb)
        {
            return Err(malformed("segments do not cover the column range"));
        }

        let path_len = read_u32(reader)? as usize;
        let mut path_bytes = vec![0u8; path_len];
        reader
            .read_exact(&mut path_bytes)
            .map_err(|_| malformed("truncated input path"))?;
        let input_path = String::from_utf8(path_bytes)
            .map_err(|_| malformed("input path is not valid UTF-8"))?;

        Ok(SegmentationContainer {
            segment_length,
            max_segment_size,
            sequence_count,
            sequence_length,
            alphabet_symbols,
            cells,
            input_path,
        })
    }
}

fn malformed(what: &str) -> Error {
    Error::InputMalformed(format!("segmentation container: {}", what))
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|_| malformed("truncated field"))?;
    Ok(u32::from_le_bytes(buf))
}
