//! Splitting of a contiguous index interval into nearly-equal groups.
//!
//! Work is distributed everywhere in this crate by the same rule: an interval
//! `[start, end)` of length `len` is cut into `num_groups` contiguous groups,
//! and the first `len % num_groups` of them receive one extra element. Workers
//! may be hosts, processes or threads, and the split can be nested by calling
//! [`group_range`] again on the range returned at the level above.

use std::ops::Range;

fn check_interval(start: usize, end: usize, num_groups: usize) {
    assert!(end >= start, "Interval end {end} precedes start {start}");
    assert!(num_groups > 0, "Number of groups must be positive");
}

/// Range of group `group` when `[start, end)` is split into `num_groups` groups.
pub fn group_range(start: usize, end: usize, num_groups: usize, group: usize) -> Range<usize> {
    check_interval(start, end, num_groups);
    assert!(
        group < num_groups,
        "Group index {group} out of range for {num_groups} groups"
    );
    let len = end - start;
    let base = len / num_groups;
    let remainder = len % num_groups;
    let first = start + group * base + group.min(remainder);
    let size = base + usize::from(group < remainder);
    first..first + size
}

/// The `num_groups + 1` boundaries of the groups of `[start, end)`.
pub fn group_boundaries(start: usize, end: usize, num_groups: usize) -> Vec<usize> {
    check_interval(start, end, num_groups);
    let mut bounds = Vec::with_capacity(num_groups + 1);
    bounds.push(start);
    bounds.extend((0..num_groups).map(|g| group_range(start, end, num_groups, g).end));
    bounds
}

/// Sizes of the groups of `[start, end)`.
pub fn group_sizes(start: usize, end: usize, num_groups: usize) -> Vec<usize> {
    check_interval(start, end, num_groups);
    (0..num_groups)
        .map(|g| group_range(start, end, num_groups, g).len())
        .collect()
}

/// Boundaries of the runs of consecutive integers in `values`.
///
/// The result starts with 0, lists the index of every element that does not
/// continue its predecessor's run, and ends with `values.len()`. An empty
/// input yields `[0, 0]`.
pub fn group_consecutive(values: &[usize]) -> Vec<usize> {
    let mut bounds = vec![0];
    bounds.extend(
        values
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[0].checked_add(1) != Some(w[1]))
            .map(|(i, _)| i + 1),
    );
    bounds.push(values.len());
    bounds
}
