// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Random joining: the K slots of every segment are filled with substring
//! rows according to their copy numbers and shuffled with a Mersenne Twister
//! seeded from the user-supplied value. One generator is drawn through all
//! segments in order, so a seed fixes the entire output byte for byte.

use rand_mt::Mt;

use crate::data_structures::int_vector::IntVector;

use super::{init_permutations, SubstringCopyNumber};

/// Build one shuffled permutation of substring rows per segment.
///
/// Returns the permutations together with the gap marker value (which cannot
/// occur here, as the copy numbers are padded to sum to K, but the emission
/// path treats it uniformly).
pub fn create_permutations(
    copy_numbers: &[Vec<SubstringCopyNumber>],
    k: u32,
    seq_count: u32,
    seed: u32,
) -> (Vec<IntVector>, u64) {
    let (mut permutations, permutation_max) =
        init_permutations(copy_numbers.len(), k, seq_count);
    let mut rng = Mt::new(seed);

    for (cn, permutation) in copy_numbers.iter().zip(permutations.iter_mut()) {
        let mut start = 0usize;
        for c in cn {
            // Copy numbers are running sums at this point.
            let end = c.copy_number as usize;
            permutation.fill_range(start, end, u64::from(c.substring_idx));
            start = end;
        }
        if start < k as usize {
            permutation.fill_range(start, k as usize, permutation_max);
        }
        permutation.shuffle(&mut rng);
    }

    (permutations, permutation_max)
}
