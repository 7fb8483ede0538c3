//! Run-length voting over noisy per-frame signals.
//!
//! A run is a contiguous stretch of matching elements. With a tolerance of
//! `n`, up to `n` consecutive non-matching elements between two matching ones
//! are bridged and counted as part of the run. A run always starts and ends
//! on a matching element, so trailing gaps are never counted.

/// Longest run found in a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Run {
    /// Number of elements in the run, bridged gaps included.
    pub len: usize,
    /// Index of the last matching element of the run.
    pub last: Option<usize>,
}

impl Run {
    /// Index of the first element of the run.
    pub fn first(&self) -> Option<usize> {
        self.last.map(|last| last + 1 - self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Longest run of elements matching `pred`, bridging gaps of at most
/// `tolerance` non-matching elements. The earliest run wins ties.
pub fn longest_run_with_tolerance<T, F>(items: &[T], tolerance: usize, pred: F) -> Run
where
    F: Fn(&T) -> bool,
{
    let mut best = Run::default();
    let mut current_len = 0usize;
    let mut current_last = 0usize;
    let mut gap = 0usize;

    for (i, item) in items.iter().enumerate() {
        if pred(item) {
            current_len += 1 + gap;
            current_last = i;
            gap = 0;
            continue;
        }

        if current_len == 0 {
            continue;
        }

        gap += 1;
        if gap > tolerance {
            if current_len > best.len {
                best = Run {
                    len: current_len,
                    last: Some(current_last),
                };
            }
            current_len = 0;
            gap = 0;
        }
    }

    if current_len > best.len {
        best = Run {
            len: current_len,
            last: Some(current_last),
        };
    }

    best
}

/// Longest strictly contiguous run of elements matching `pred`.
pub fn longest_run<T, F>(items: &[T], pred: F) -> Run
where
    F: Fn(&T) -> bool,
{
    longest_run_with_tolerance(items, 0, pred)
}

/// Index of the last element matching `pred`.
pub fn last_index_where<T, F>(items: &[T], pred: F) -> Option<usize>
where
    F: Fn(&T) -> bool,
{
    items.iter().rposition(pred)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: bool = true;
    const F: bool = false;

    fn run(items: &[bool], tolerance: usize) -> Run {
        longest_run_with_tolerance(items, tolerance, |b| *b)
    }

    #[test]
    fn test_single_gap_is_bridged() {
        let items = [T, T, F, T, T];
        assert_eq!(run(&items, 1), Run { len: 5, last: Some(4) });
        assert_eq!(run(&items, 0), Run { len: 2, last: Some(1) });
    }

    #[test]
    fn test_gap_wider_than_tolerance_splits_run() {
        let items = [T, F, F, T];
        assert_eq!(run(&items, 1).len, 1);
        assert_eq!(run(&items, 2).len, 4);
    }

    #[test]
    fn test_trailing_and_leading_gaps_not_counted() {
        assert_eq!(run(&[T, F], 1), Run { len: 1, last: Some(0) });
        assert_eq!(run(&[F, F, T], 1), Run { len: 1, last: Some(2) });
    }

    #[test]
    fn test_reports_end_of_longest_run() {
        let items = [T, F, F, T, T, T, F, F, T];
        let longest = run(&items, 1);
        assert_eq!(longest.len, 3);
        assert_eq!(longest.last, Some(5));
        assert_eq!(longest.first(), Some(3));
    }

    #[test]
    fn test_empty_and_all_false() {
        assert_eq!(run(&[], 1), Run::default());
        assert!(run(&[F, F, F], 1).is_empty());
        assert_eq!(run(&[F, F, F], 1).first(), None);
    }

    #[test]
    fn test_predicate_over_options() {
        let scores = [Some(0.9), None, Some(0.2), Some(0.7)];
        let contiguous = longest_run(&scores, |s| s.map_or(false, |v| v > 0.5));
        assert_eq!(contiguous.len, 1);
        assert_eq!(last_index_where(&scores, |s| s.map_or(false, |v| v >= 0.5)), Some(3));
    }
}
