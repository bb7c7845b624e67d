//! Longest increasing subsequence.
//!
//! The keyed diff uses it to find the largest set of surviving children that
//! are already in the right relative order. Those stay put and everything
//! else is moved around them.

/// Positions in `seq` forming a longest strictly increasing subsequence of
/// its `Some` values. `None` entries are skipped.
///
/// Patience sort: `tails[k]` holds the entry ending the best run of length
/// `k + 1` seen so far, and each entry remembers its predecessor so the run
/// can be walked back at the end. O(n log n).
///
/// ```rust,ignore
/// let seq = [Some(4), Some(2), Some(3), None];
/// assert_eq!(longest_increasing_subsequence(&seq), vec![1, 2]);
/// ```
pub fn longest_increasing_subsequence(seq: &[Option<usize>]) -> Vec<usize> {
    let items: Vec<(usize, usize)> = seq
        .iter()
        .enumerate()
        .filter_map(|(position, value)| value.map(|value| (position, value)))
        .collect();

    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; items.len()];

    for (i, &(_, value)) in items.iter().enumerate() {
        let slot = tails.partition_point(|&t| items[t].1 < value);
        if slot > 0 {
            prev[i] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }

    let mut out = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        out.push(items[i].0);
        cursor = prev[i];
    }
    out.reverse();
    out
}
