// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Sequence input: FASTA files and list files naming one sequence file per
//! line. Both produce an equal-length [`SequenceMatrix`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::errors::{Error, Result};
use crate::matrix::SequenceMatrix;

/// Supported input layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Fasta,
    ListFile,
}

/// Read the input into a sequence matrix.
pub fn read_sequences(path: &Path, format: InputFormat) -> Result<SequenceMatrix> {
    let rows = match format {
        InputFormat::Fasta => {
            let file = File::open(path).map_err(|e| open_error(path, &e))?;
            read_fasta(BufReader::new(file))?
        }
        InputFormat::ListFile => read_list_file(path)?,
    };
    let matrix = SequenceMatrix::new(rows)?;
    info!(
        sequences = matrix.n_rows(),
        length = matrix.n_cols(),
        "loaded input"
    );
    Ok(matrix)
}

/// Parse FASTA records from a reader, returning the sequences in file order.
/// Record descriptions are not retained; multi-line sequences are
/// concatenated.
pub fn read_fasta<R: BufRead>(reader: R) -> Result<Vec<Vec<u8>>> {
    let mut rows: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<Vec<u8>> = None;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if line.starts_with('>') {
            // Record descriptions are not retained.
            if let Some(seq) = current.take() {
                rows.push(seq);
            }
            current = Some(Vec::new());
        } else {
            match current.as_mut() {
                Some(seq) => seq.extend_from_slice(line.as_bytes()),
                None => {
                    return Err(Error::InputMalformed(format!(
                        "FASTA line {} contains sequence data before the first header",
                        lineno + 1
                    )))
                }
            }
        }
    }
    if let Some(seq) = current.take() {
        rows.push(seq);
    }
    Ok(rows)
}

/// Read a list file: every line names a file whose non-empty lines are taken
/// as sequences, typically exactly one.
pub fn read_list_file(path: &Path) -> Result<Vec<Vec<u8>>> {
    let file = File::open(path).map_err(|e| open_error(path, &e))?;
    let mut rows: Vec<Vec<u8>> = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let entry = line.trim();
        if entry.is_empty() {
            continue;
        }
        let entry_path = Path::new(entry);
        let listed = File::open(entry_path).map_err(|e| open_error(entry_path, &e))?;
        for seq_line in BufReader::new(listed).lines() {
            let seq_line = seq_line?;
            let seq = seq_line.trim_end_matches('\r');
            if !seq.is_empty() {
                rows.push(seq.as_bytes().to_vec());
            }
        }
    }
    Ok(rows)
}

fn open_error(path: &Path, err: &std::io::Error) -> Error {
    Error::InputMalformed(format!("cannot open {}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fasta_multiline_records() {
        let input = b">one desc\nACGT\nACGT\n>two\nTTTT\nGGGG\n" as &[u8];
        let rows = read_fasta(input).unwrap();
        assert_eq!(rows, vec![b"ACGTACGT".to_vec(), b"TTTTGGGG".to_vec()]);
    }

    #[test]
    fn test_fasta_crlf_and_blank_lines() {
        let input = b">a\r\nAC\r\n\r\nGT\r\n" as &[u8];
        let rows = read_fasta(input).unwrap();
        assert_eq!(rows, vec![b"ACGT".to_vec()]);
    }

    #[test]
    fn test_fasta_data_before_header_rejected() {
        let input = b"ACGT\n>late\nACGT\n" as &[u8];
        let err = read_fasta(input).unwrap_err();
        assert!(matches!(err, Error::InputMalformed(_)));
    }

    #[test]
    fn test_list_file_reads_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let seq_a = dir.path().join("a.txt");
        let seq_b = dir.path().join("b.txt");
        std::fs::write(&seq_a, "ACGT\n").unwrap();
        std::fs::write(&seq_b, "TTTT\n").unwrap();

        let list = dir.path().join("list.txt");
        let mut f = File::create(&list).unwrap();
        writeln!(f, "{}", seq_a.display()).unwrap();
        writeln!(f, "{}", seq_b.display()).unwrap();
        drop(f);

        let matrix = read_sequences(&list, InputFormat::ListFile).unwrap();
        assert_eq!(matrix.n_rows(), 2);
        assert_eq!(matrix.row(0), b"ACGT");
        assert_eq!(matrix.row(1), b"TTTT");
    }

    #[test]
    fn test_missing_listed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list.txt");
        std::fs::write(&list, "/nonexistent/path.txt\n").unwrap();
        let err = read_sequences(&list, InputFormat::ListFile).unwrap_err();
        match err {
            Error::InputMalformed(msg) => assert!(msg.contains("cannot open")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unequal_fasta_lengths_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = dir.path().join("in.fa");
        std::fs::write(&fasta, ">a\nACGT\n>b\nACG\n").unwrap();
        assert!(read_sequences(&fasta, InputFormat::Fasta).is_err());
    }
}
