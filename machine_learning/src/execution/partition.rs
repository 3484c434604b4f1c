use std::{num::NonZeroUsize, ops::Range};

/// Splits `total` samples into `workers` contiguous shards.
///
/// Every shard but the last gets `total / workers` samples and the last one absorbs the
/// remainder, so the ranges are disjoint, ordered and cover `[0..total)` exactly once. When
/// there are more workers than samples the leading shards are empty.
pub fn shard_ranges(total: usize, workers: NonZeroUsize) -> Vec<Range<usize>> {
    let workers = workers.get();
    let feed = total / workers;

    (0..workers)
        .map(|worker| {
            let start = worker * feed;
            let end = if worker == workers - 1 {
                total
            } else {
                start + feed
            };

            start..end
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn last_shard_absorbs_remainder() {
        // total 10, workers 3 => sizes 3,3,4
        assert_eq!(shard_ranges(10, nz(3)), vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn more_workers_than_samples() {
        let ranges = shard_ranges(3, nz(8));

        assert_eq!(ranges.len(), 8);
        assert!(ranges[..7].iter().all(|r| r.is_empty()));
        assert_eq!(ranges[7], 0..3);
    }

    #[test]
    fn single_worker_takes_everything() {
        assert_eq!(shard_ranges(5, nz(1)), vec![0..5]);
    }

    #[test]
    fn covers_every_sample_exactly_once() {
        for total in 0..40 {
            for workers in 1..12 {
                let ranges = shard_ranges(total, nz(workers));
                let covered: Vec<_> = ranges.into_iter().flatten().collect();
                let expected: Vec<_> = (0..total).collect();

                assert_eq!(covered, expected, "total={total} workers={workers}");
            }
        }
    }
}
