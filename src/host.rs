use rayon::prelude::*;

/// Single-pass wrapping sum. Every other runner is checked against
/// this one, never the reverse.
pub fn sum_sequential(values: &[u32]) -> u32 {
    values.iter().fold(0u32, |acc, &v| acc.wrapping_add(v))
}

/// Multi-core wrapping sum over contiguous chunks, one per pool
/// thread. Wrapping addition is commutative and associative, so the
/// fan-in combine order cannot change the result and the output is
/// bit-identical to [`sum_sequential`] for every input.
pub fn sum_parallel(values: &[u32]) -> u32 {
    if values.is_empty() {
        return 0;
    }
    let chunk = values.len().div_ceil(rayon::current_num_threads()).max(1);
    values
        .par_chunks(chunk)
        .map(sum_sequential)
        .reduce(|| 0, u32::wrapping_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input;

    #[test]
    fn sequential_is_deterministic() {
        let values = input::generate(50_000, 42);
        let first = sum_sequential(&values);
        for _ in 0..5 {
            assert_eq!(sum_sequential(&values), first);
        }
    }

    #[test]
    fn parallel_matches_sequential() {
        for n in [0usize, 1, 2, 127, 128, 1_000, 65_537, 1_000_000] {
            let values = input::generate(n, 42);
            assert_eq!(
                sum_parallel(&values),
                sum_sequential(&values),
                "n = {}",
                n
            );
        }
    }

    #[test]
    fn parallel_matches_sequential_under_wraparound() {
        let values = vec![u32::MAX; 5];
        let expected = 5u32.wrapping_mul(u32::MAX);
        assert_eq!(sum_sequential(&values), expected);
        assert_eq!(sum_parallel(&values), expected);
    }

    #[test]
    fn single_element_is_identity() {
        assert_eq!(sum_sequential(&[1234]), 1234);
        assert_eq!(sum_parallel(&[1234]), 1234);
    }
}
