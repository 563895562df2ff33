// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end runs of the generation pipeline covering all joining
//! disciplines, founder fidelity and segmentation reuse.

use founder_sequences::join::{BipartiteSetScoring, SegmentJoining};
use founder_sequences::matrix::SequenceMatrix;
use founder_sequences::pipeline::{generate, GenerateConfig, GenerateOutcome};
use founder_sequences::segmentation::container::SegmentationContainer;
use founder_sequences::segmentation::dp::no_progress;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

fn config(joining: SegmentJoining, l: u32) -> GenerateConfig {
    GenerateConfig {
        segment_length: l,
        joining,
        set_scoring: BipartiteSetScoring::SymmetricDifference,
        pbwt_sample_rate: 1,
        random_seed: 42,
        single_threaded: false,
    }
}

fn run(matrix: &SequenceMatrix, cfg: &GenerateConfig) -> (GenerateOutcome, Vec<Vec<u8>>) {
    let mut founders = Vec::new();
    let outcome = generate(matrix, cfg, no_progress(), &mut founders, None, None, "run")
        .expect("generation failed");
    let rows: Vec<Vec<u8>> = founders
        .split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| line.to_vec())
        .collect();
    assert_eq!(rows.len(), outcome.founder_count as usize);
    for row in &rows {
        assert_eq!(row.len(), matrix.n_cols());
    }
    (outcome, rows)
}

/// Every input row's substring on every segment must appear in some founder
/// on the same columns.
fn assert_founder_fidelity(matrix: &SequenceMatrix, outcome: &GenerateOutcome, founders: &[Vec<u8>]) {
    for cell in &outcome.segmentation.cells {
        let lb = cell.lb as usize;
        let rb = cell.rb as usize;
        let covered: HashSet<&[u8]> = founders.iter().map(|f| &f[lb..rb]).collect();
        for row in matrix.rows() {
            assert!(
                covered.contains(&row[lb..rb]),
                "substring {:?} on [{}, {}) missing from the founders",
                String::from_utf8_lossy(&row[lb..rb]),
                lb,
                rb
            );
        }
    }
}

fn matrix(rows: &[&[u8]]) -> SequenceMatrix {
    SequenceMatrix::new(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
}

fn all_joinings() -> Vec<SegmentJoining> {
    vec![
        SegmentJoining::PbwtOrder,
        SegmentJoining::Random,
        SegmentJoining::Greedy,
        SegmentJoining::BipartiteMatching,
    ]
}

#[test]
fn scenario_identical_rows_single_founder() {
    let m = matrix(&[b"ACGTACGT", b"ACGTACGT", b"ACGTACGT", b"ACGTACGT"]);
    let (outcome, founders) = run(&m, &config(SegmentJoining::PbwtOrder, 2));
    assert_eq!(outcome.founder_count, 1);
    assert_eq!(founders, vec![b"ACGTACGT".to_vec()]);
}

#[test]
fn scenario_two_haplotypes_greedy() {
    let m = matrix(&[b"AAAA", b"AACC"]);
    let (outcome, founders) = run(&m, &config(SegmentJoining::Greedy, 2));
    assert_eq!(outcome.founder_count, 2);
    let set: HashSet<Vec<u8>> = founders.iter().cloned().collect();
    assert!(set.contains(&b"AAAA".to_vec()));
    assert!(set.contains(&b"AACC".to_vec()));
    assert_founder_fidelity(&m, &outcome, &founders);
}

#[test]
fn scenario_three_rows_bipartite_intersection() {
    let m = matrix(&[b"AAAA", b"AATT", b"AAGG"]);
    let mut cfg = config(SegmentJoining::BipartiteMatching, 2);
    cfg.set_scoring = BipartiteSetScoring::Intersection;
    let (outcome, founders) = run(&m, &cfg);
    assert_eq!(outcome.founder_count, 3);
    assert_eq!(outcome.segment_count, 1);
    assert_eq!(outcome.segmentation.cells[0].lb, 0);
    assert_eq!(outcome.segmentation.cells[0].rb, 4);
    let set: HashSet<Vec<u8>> = founders.iter().cloned().collect();
    let expected: HashSet<Vec<u8>> =
        vec![b"AAAA".to_vec(), b"AATT".to_vec(), b"AAGG".to_vec()].into_iter().collect();
    assert_eq!(set, expected);
}

#[test]
fn scenario_recombining_founders_pbwt_order() {
    let m = matrix(&[b"ACGT", b"AGGT", b"ACCT"]);
    let (outcome, founders) = run(&m, &config(SegmentJoining::PbwtOrder, 2));
    assert_eq!(outcome.founder_count, 2);
    // The cut falls between the diverging halves.
    assert_eq!(outcome.segment_count, 2);
    assert_eq!(outcome.segmentation.cells[0].rb, 2);
    assert_founder_fidelity(&m, &outcome, &founders);
    let set: HashSet<Vec<u8>> = founders.iter().cloned().collect();
    let expected: HashSet<Vec<u8>> =
        vec![b"ACCT".to_vec(), b"AGGT".to_vec()].into_iter().collect();
    assert_eq!(set, expected);
}

fn random_binary_matrix(seed: u64, n_rows: usize, n_cols: usize) -> SequenceMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    SequenceMatrix::new(
        (0..n_rows)
            .map(|_| (0..n_cols).map(|_| if rng.gen() { b'1' } else { b'0' }).collect())
            .collect(),
    )
    .unwrap()
}

#[test]
fn scenario_random_binary_all_joinings() {
    let m = random_binary_matrix(42, 8, 32);
    for joining in all_joinings() {
        let (outcome, founders) = run(&m, &config(joining, 8));
        assert!(outcome.founder_count <= 8, "joining {:?}", joining);
        assert_founder_fidelity(&m, &outcome, &founders);
    }
}

#[test]
fn scenario_segmentation_round_trip_reproduces_founders() {
    let m = random_binary_matrix(42, 8, 32);
    let cfg = config(SegmentJoining::Greedy, 8);

    let mut first = Vec::new();
    let outcome = generate(&m, &cfg, no_progress(), &mut first, None, None, "orig").unwrap();

    // Serialise, reload, re-join.
    let mut blob = Vec::new();
    outcome.segmentation.write(&mut blob).unwrap();
    let restored = SegmentationContainer::read(&mut blob.as_slice()).unwrap();
    assert_eq!(restored.max_segment_size, outcome.founder_count);

    let mut second = Vec::new();
    generate(&m, &cfg, no_progress(), &mut second, None, Some(&restored), "orig").unwrap();
    assert_eq!(first, second);
}

#[test]
fn scenario_fully_disagreeing_rows_random_joining() {
    let m = matrix(&[b"AAAAAA", b"CCCCCC"]);
    let cfg = config(SegmentJoining::Random, 2);
    let (outcome, founders) = run(&m, &cfg);
    assert_eq!(outcome.founder_count, 2);
    let set: HashSet<Vec<u8>> = founders.iter().cloned().collect();
    let expected: HashSet<Vec<u8>> =
        vec![b"AAAAAA".to_vec(), b"CCCCCC".to_vec()].into_iter().collect();
    assert_eq!(set, expected);

    // Same seed, byte-identical output.
    let (_, again) = run(&m, &cfg);
    assert_eq!(founders, again);
}

#[test]
fn random_joining_is_seed_reproducible() {
    let m = random_binary_matrix(7, 6, 24);
    let cfg = config(SegmentJoining::Random, 4);
    let (_, first) = run(&m, &cfg);
    let (_, second) = run(&m, &cfg);
    assert_eq!(first, second);

    let mut other_seed = cfg.clone();
    other_seed.random_seed = 43;
    let (_, third) = run(&m, &other_seed);
    // Not required to differ, but the shape must hold.
    assert_eq!(third.len(), first.len());
}

#[test]
fn coverage_and_minimum_length_hold_across_joinings() {
    let m = random_binary_matrix(11, 6, 40);
    for joining in all_joinings() {
        let (outcome, founders) = run(&m, &config(joining, 5));
        let cells = &outcome.segmentation.cells;
        assert_eq!(cells.first().unwrap().lb, 0);
        assert_eq!(cells.last().unwrap().rb, 40);
        for pair in cells.windows(2) {
            assert_eq!(pair[0].rb, pair[1].lb);
        }
        for cell in cells {
            assert!(cell.rb - cell.lb >= 5);
        }
        assert_founder_fidelity(&m, &outcome, &founders);
    }
}

#[test]
fn segment_listing_matches_output_mode() {
    let m = random_binary_matrix(3, 5, 24);

    // Copy-number layout for PBWT order…
    let mut founders = Vec::new();
    let mut segments = Vec::new();
    generate(
        &m,
        &config(SegmentJoining::PbwtOrder, 4),
        no_progress(),
        &mut founders,
        Some(&mut segments),
        None,
        "",
    )
    .unwrap();
    let listing = String::from_utf8(segments).unwrap();
    assert!(listing.starts_with("SEGMENT\tLB\tRB\tSIZE\tSUBSEQUENCE_NUMBER\tCOPY_NUMBER\tSUBSEQUENCE"));

    // …and the matcher layout for greedy.
    let mut founders = Vec::new();
    let mut segments = Vec::new();
    generate(
        &m,
        &config(SegmentJoining::Greedy, 4),
        no_progress(),
        &mut founders,
        Some(&mut segments),
        None,
        "",
    )
    .unwrap();
    let listing = String::from_utf8(segments).unwrap();
    assert!(listing.starts_with("SEGMENT\tLB\tRB\tSIZE\tSUBSEQUENCE\tSEQUENCES\tCOPIED_FROM"));
}

#[test]
fn uneven_segments_leave_gaps_in_greedy_but_not_bipartite() {
    // Segment [0, 4) holds two distinct substrings, [4, 8) three, so K = 3
    // and the smaller segment cannot fill all founder rows.
    let m = matrix(&[b"AAAAAAAA", b"AAAACCCC", b"CCCCGGGG", b"CCCCAAAA"]);

    let (outcome, founders) = run(&m, &config(SegmentJoining::Greedy, 2));
    assert_eq!(outcome.founder_count, 3);
    assert_eq!(outcome.segment_count, 2);
    assert!(founders.iter().any(|f| f.contains(&b'-')));
    assert_founder_fidelity(&m, &outcome, &founders);

    // Bipartite joining pads with copies instead.
    let (outcome, founders) = run(&m, &config(SegmentJoining::BipartiteMatching, 2));
    assert_eq!(outcome.founder_count, 3);
    assert!(founders.iter().all(|f| !f.contains(&b'-')));
    assert_founder_fidelity(&m, &outcome, &founders);
}

#[test]
fn founders_spell_every_input_sequence() {
    use founder_sequences::matcher::match_sequence_to_founders;

    let m = random_binary_matrix(23, 6, 48);
    for joining in all_joinings() {
        let (_, founders) = run(&m, &config(joining, 6));
        let founder_matrix = SequenceMatrix::new(founders).unwrap();
        for row in m.rows() {
            // Every original sequence decomposes into founder ranges.
            let ranges = match_sequence_to_founders(row, &founder_matrix).unwrap();
            assert_eq!(ranges.first().unwrap().lb, 0);
            assert_eq!(ranges.last().unwrap().rb, 48);
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].rb, pair[1].lb);
            }
        }
    }
}

#[test]
fn copy_number_listing_sums_to_founder_count() {
    let m = random_binary_matrix(19, 7, 36);
    let mut founders = Vec::new();
    let mut segments = Vec::new();
    let outcome = generate(
        &m,
        &config(SegmentJoining::PbwtOrder, 4),
        no_progress(),
        &mut founders,
        Some(&mut segments),
        None,
        "",
    )
    .unwrap();
    let listing = String::from_utf8(segments).unwrap();
    let mut per_segment: Vec<u32> = vec![0; outcome.segment_count];
    for line in listing.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        let segment: usize = fields[0].parse().unwrap();
        let copy_number: u32 = fields[5].parse().unwrap();
        per_segment[segment] += copy_number;
    }
    for total in per_segment {
        assert_eq!(total, outcome.founder_count);
    }
}
