use std::collections::BTreeSet;

/// Token indices believed to form one mention.
pub type Cluster = BTreeSet<usize>;

/// Maps span offsets onto token indices of `token_offsets` and groups them
/// into clusters.
///
/// An offset belongs to the last token starting at or before it. Indices that
/// repeat the previous one or follow it directly join the current cluster; a
/// jump of two or more tokens opens a new one.
pub fn condense(span_offsets: &[usize], token_offsets: &[usize]) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut last: Option<usize> = None;
    for &off in span_offsets {
        let p = token_offsets.partition_point(|&t| t <= off);
        if p == 0 {
            continue;
        }
        let idx = p - 1;
        match (last, clusters.last_mut()) {
            (Some(l), Some(current)) if p <= l => {
                current.insert(idx);
            }
            _ => clusters.push(BTreeSet::from([idx])),
        }
        last = Some(p + 1);
    }
    clusters
}

/// Clusters ordered by their smallest index.
pub fn sorted_by_start(mut clusters: Vec<Cluster>) -> Vec<Cluster> {
    clusters.sort_by_key(|c| c.first().copied().unwrap_or(usize::MAX));
    clusters
}
