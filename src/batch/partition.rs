//! Static range partitioning of a directory listing.
//!
//! `chunk = ceil(N / K)`; partition `i` covers `[i*chunk, min((i+1)*chunk, N))`.
//! A partition that drains early does not take over work from the others.

use std::ops::Range;

/// Index ranges of the `concurrency` partitions of `len` items
pub fn ranges(len: usize, concurrency: usize) -> Vec<Range<usize>> {
    let k = concurrency.max(1);
    let chunk = len.div_ceil(k);
    (0..k)
        .map(|i| {
            let start = (i * chunk).min(len);
            let end = ((i + 1) * chunk).min(len);
            start..end
        })
        .collect()
}

/// Split `items` into exactly `concurrency` contiguous partitions, keeping order
pub fn partition<T>(items: Vec<T>, concurrency: usize) -> Vec<Vec<T>> {
    let ranges = ranges(items.len(), concurrency);
    let mut items = items.into_iter();
    ranges
        .into_iter()
        .map(|range| items.by_ref().take(range.len()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_items_two_partitions() {
        let parts = partition(vec!["a", "b", "c"], 2);
        assert_eq!(parts, vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn test_more_partitions_than_items() {
        let parts = partition(vec![1, 2], 4);
        assert_eq!(parts, vec![vec![1], vec![2], vec![], vec![]]);

        let parts = partition(Vec::<u8>::new(), 3);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_zero_concurrency_means_one_partition() {
        assert_eq!(partition(vec![1, 2, 3], 0), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_exact_coverage_for_all_sizes() {
        for n in 0..40usize {
            for k in 1..12usize {
                let items: Vec<usize> = (0..n).collect();
                let parts = partition(items.clone(), k);
                assert_eq!(parts.len(), k, "n={} k={}", n, k);

                // Concatenation in partition order equals the input: disjoint and complete
                let flat: Vec<usize> = parts.iter().flatten().copied().collect();
                assert_eq!(flat, items, "n={} k={}", n, k);

                let chunk = n.div_ceil(k);
                for (i, part) in parts.iter().enumerate() {
                    assert!(part.len() <= chunk, "n={} k={} part {}", n, k, i);
                    let range = &ranges(n, k)[i];
                    assert_eq!(part.first().copied(), if range.is_empty() { None } else { Some(range.start) });
                }
            }
        }
    }
}
