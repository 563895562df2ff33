// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Range-minimum queries over an append-only vector.
//!
//! The structure is a sparse table over fixed-size blocks: whenever a block of
//! the underlying vector fills up, the block's argmin is appended to the
//! level-0 table and the higher levels are extended by one entry each, so an
//! append costs O(log len) amortised and a query O(1) plus at most two
//! partial-block scans. Elements of the rightmost, incomplete block are
//! covered by a linear fallback scan.
//!
//! The vector itself is owned by the caller and passed into every operation;
//! the table stores indices only. Queries return the position of *a* minimal
//! element; with a strict `<` comparison any of the tied positions may win.
//!
//! # Example
//!
//! ```
//! use founder_sequences::data_structures::rmq::Rmq;
//!
//! let mut rmq = Rmq::new();
//! let mut values = Vec::new();
//! for v in [5u32, 3, 9, 3, 7] {
//!     values.push(v);
//!     rmq.update(&values, values.len() - 1);
//! }
//! assert_eq!(rmq.query(&values, 0, 5), 1);
//! assert_eq!(rmq.query(&values, 2, 5), 3);
//! ```

/// Default block size; must be a power of two.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// An argmin sparse table over blocks of an external, append-only vector.
#[derive(Debug, Clone)]
pub struct Rmq {
    // precalc[p][k] is the argmin over the blocks [k, k + 2^p).
    precalc: Vec<Vec<usize>>,
    block_size: usize,
}

impl Default for Rmq {
    fn default() -> Self {
        Rmq::new()
    }
}

impl Rmq {
    pub fn new() -> Self {
        Rmq::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(block_size: usize) -> Self {
        assert!(
            block_size.is_power_of_two(),
            "block size must be a power of two"
        );
        Rmq {
            precalc: vec![Vec::new()],
            block_size,
        }
    }

    /// Extend the table after `values[last_idx]` has been appended or
    /// assigned. Only completes tables when `last_idx` closes a block.
    pub fn update<T: Ord>(&mut self, values: &[T], last_idx: usize) {
        if (1 + last_idx) & (self.block_size - 1) != 0 {
            return;
        }

        // bnum complete blocks exist now; the newest is bnum - 1.
        let bnum = 1 + last_idx / self.block_size;
        let new_smp = self.scan_min(values, (bnum - 1) * self.block_size, bnum * self.block_size);
        self.precalc[0].push(new_smp);

        let mut p = 1;
        while (1usize << p) <= bnum {
            if self.precalc.len() <= p {
                self.precalc.push(Vec::new());
            }
            let k = bnum - (1 << p);
            let smp1 = self.precalc[p - 1][k];
            let smp2 = self.precalc[p - 1][bnum - (1 << (p - 1))];
            let smp = if values[smp2] < values[smp1] { smp2 } else { smp1 };
            self.precalc[p].push(smp);
            p += 1;
        }
    }

    /// Position of a minimal element in `values[beg..end)`.
    pub fn query<T: Ord>(&self, values: &[T], beg: usize, end: usize) -> usize {
        debug_assert!(beg < end && end <= values.len());

        let beg_block = beg / self.block_size + 1;
        let end_block = end / self.block_size;

        if beg_block >= end_block {
            return self.scan_min(values, beg, end);
        }

        // Two overlapping power-of-two windows cover the complete blocks.
        let p = Self::log2_floor(end_block - beg_block);
        let smp1 = self.precalc[p][beg_block];
        let smp2 = self.precalc[p][end_block - (1 << p)];
        let mut smp = if values[smp2] < values[smp1] { smp2 } else { smp1 };

        let left_smp = self.scan_min(values, beg, beg_block * self.block_size);
        if values[left_smp] < values[smp] {
            smp = left_smp;
        }

        if end == end_block * self.block_size {
            return smp;
        }

        let right_smp = self.scan_min(values, end_block * self.block_size, end);
        if values[right_smp] < values[smp] {
            smp = right_smp;
        }
        smp
    }

    fn scan_min<T: Ord>(&self, values: &[T], first: usize, last: usize) -> usize {
        debug_assert!(first < last && last <= values.len());
        let mut best = first;
        for idx in first + 1..last {
            if values[idx] < values[best] {
                best = idx;
            }
        }
        best
    }

    fn log2_floor(v: usize) -> usize {
        debug_assert!(v > 0);
        (usize::BITS - 1 - v.leading_zeros()) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn naive_argmin(values: &[u32], beg: usize, end: usize) -> usize {
        let mut best = beg;
        for i in beg + 1..end {
            if values[i] < values[best] {
                best = i;
            }
        }
        best
    }

    #[test]
    fn test_small_block_exhaustive() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut rmq = Rmq::with_block_size(4);
        let mut values: Vec<u32> = Vec::new();
        for _ in 0..97 {
            values.push(rng.gen_range(0..50));
            rmq.update(&values, values.len() - 1);
        }
        for beg in 0..values.len() {
            for end in beg + 1..=values.len() {
                assert_eq!(
                    rmq.query(&values, beg, end),
                    naive_argmin(&values, beg, end),
                    "range [{}, {})",
                    beg,
                    end
                );
            }
        }
    }

    #[test]
    fn test_default_block_size_randomized() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut rmq = Rmq::new();
        let mut values: Vec<u32> = Vec::new();
        for _ in 0..700 {
            values.push(rng.gen_range(0..1000));
            rmq.update(&values, values.len() - 1);
        }
        for _ in 0..2000 {
            let beg = rng.gen_range(0..values.len());
            let end = rng.gen_range(beg + 1..=values.len());
            assert_eq!(
                rmq.query(&values, beg, end),
                naive_argmin(&values, beg, end)
            );
        }
    }

    #[test]
    fn test_all_equal_values() {
        let mut rmq = Rmq::with_block_size(4);
        let values = vec![2u32; 40];
        for i in 0..values.len() {
            rmq.update(&values, i);
        }
        let idx = rmq.query(&values, 5, 21);
        assert!((5..21).contains(&idx));
        assert_eq!(values[idx], 2);
    }

    #[test]
    fn test_query_within_incomplete_block() {
        let mut rmq = Rmq::new();
        let values = vec![9u32, 1, 8];
        for i in 0..values.len() {
            rmq.update(&values, i);
        }
        assert_eq!(rmq.query(&values, 0, 3), 1);
    }
}
