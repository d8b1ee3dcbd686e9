//! Batch planning for multi-project fan-out.

/// Effective batch size: 1 unless parallelism is both requested and allowed.
pub fn batch_size(
    requested_parallel: bool,
    parallel_enabled: bool,
    max_parallel_jobs: usize,
) -> usize {
    if !requested_parallel || !parallel_enabled {
        return 1;
    }
    max_parallel_jobs.max(1)
}

/// Sizes of consecutive batches covering `total` items.
pub fn batch_sizes(total: usize, size: usize) -> Vec<usize> {
    let size = size.max(1);
    (0..total)
        .step_by(size)
        .map(|start| size.min(total - start))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_when_not_requested_or_disabled() {
        assert_eq!(batch_size(false, true, 4), 1);
        assert_eq!(batch_size(true, false, 4), 1);
        assert_eq!(batch_size(true, true, 1), 1);
        assert_eq!(batch_size(true, true, 3), 3);
    }

    #[test]
    fn five_projects_two_jobs_is_two_two_one() {
        assert_eq!(batch_sizes(5, 2), vec![2, 2, 1]);
        assert_eq!(batch_sizes(4, 2), vec![2, 2]);
        assert_eq!(batch_sizes(0, 2), Vec::<usize>::new());
        assert_eq!(batch_sizes(3, 1), vec![1, 1, 1]);
    }
}
