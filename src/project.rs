use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::debug;

use crate::alignment::{Alignment, BiAlignment};
use crate::cluster::Cluster;

/// Which in-range target tokens may be added to a projected span.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonalignedPolicy {
    /// Every index inside the span's range that the alignment did not reach.
    #[default]
    AnyGap,
    /// Only indices of target tokens that carry no alignment link at all.
    UnalignedOnly,
}

impl NonalignedPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "any_gap" => Some(Self::AnyGap),
            "unaligned_only" => Some(Self::UnalignedOnly),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectOptions {
    pub nonaligned: NonalignedPolicy,
    pub quality_pass: bool,
}

#[inline]
fn is_punct_char(c: char) -> bool {
    c == '¡' || c == '¿' || (c.is_ascii_punctuation() && !matches!(c, '\'' | '-' | '\\'))
}

/// True when the token holds any punctuation other than apostrophe, hyphen or
/// backslash.
pub fn is_punct_token(token: &str) -> bool {
    token.chars().any(is_punct_char)
}

/// Fills the holes of a projected span when the filled span would cover more
/// than half of its range; sparse matches are kept as they are.
pub fn include_nonaligned(
    aligned: BTreeSet<usize>,
    backward: &Alignment,
    policy: NonalignedPolicy,
) -> BTreeSet<usize> {
    let (Some(&lo), Some(&hi)) = (aligned.first(), aligned.last()) else {
        return aligned;
    };
    let additions = (lo..=hi).filter(|i| !aligned.contains(i)).filter(|&i| match policy {
        NonalignedPolicy::AnyGap => true,
        NonalignedPolicy::UnalignedOnly => !backward.is_linked(i),
    });
    let enlarged: BTreeSet<usize> = additions.chain(aligned.iter().copied()).collect();
    let range_len = hi - lo + 1;
    if enlarged.len() * 2 > range_len {
        enlarged
    } else {
        aligned
    }
}

/// Drops punctuation that leaked onto the edges of a projected span, unless
/// the source cluster itself holds punctuation.
pub fn trim_edges<S: AsRef<str>>(
    source_cluster: &Cluster,
    source_tokens: &[S],
    mut target: BTreeSet<usize>,
    target_tokens: &[S],
) -> BTreeSet<usize> {
    let source_has_punct = source_cluster
        .iter()
        .filter_map(|&i| source_tokens.get(i))
        .any(|t| is_punct_token(t.as_ref()));
    if source_has_punct {
        return target;
    }
    while let Some(&lo) = target.first() {
        match target_tokens.get(lo) {
            Some(tok) if is_punct_token(tok.as_ref()) => {
                target.remove(&lo);
            }
            _ => break,
        }
    }
    while let Some(&hi) = target.last() {
        match target_tokens.get(hi) {
            Some(tok) if is_punct_token(tok.as_ref()) => {
                target.remove(&hi);
            }
            _ => break,
        }
    }
    target
}

/// Projects one source cluster; `None` for an empty cluster.
pub fn project_cluster<S: AsRef<str>>(
    cluster: &Cluster,
    source_tokens: &[S],
    target_tokens: &[S],
    alignment: &BiAlignment,
    policy: NonalignedPolicy,
) -> Option<BTreeSet<usize>> {
    if cluster.is_empty() {
        return None;
    }
    let aligned: BTreeSet<usize> = cluster
        .iter()
        .filter_map(|&i| alignment.forward.linked(i))
        .flatten()
        .copied()
        .collect();
    let widened = include_nonaligned(aligned, &alignment.backward, policy);
    Some(trim_edges(cluster, source_tokens, widened, target_tokens))
}

/// Target token indices matching all source clusters.
pub fn project_clusters<S: AsRef<str>>(
    source_tokens: &[S],
    target_tokens: &[S],
    alignment: &BiAlignment,
    clusters: &[Cluster],
    policy: NonalignedPolicy,
) -> BTreeSet<usize> {
    clusters
        .iter()
        .filter_map(|c| project_cluster(c, source_tokens, target_tokens, alignment, policy))
        .flatten()
        .collect()
}

/// Splits a set of indices into runs of consecutive indices.
pub fn runs(indices: &BTreeSet<usize>) -> Vec<Cluster> {
    let mut out: Vec<Cluster> = Vec::new();
    let mut prev: Option<usize> = None;
    for &i in indices {
        match (prev, out.last_mut()) {
            (Some(p), Some(run)) if i == p + 1 => {
                run.insert(i);
            }
            _ => out.push(BTreeSet::from([i])),
        }
        prev = Some(i);
    }
    out
}

/// Outcome of projecting a target span back onto the source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QualityReport {
    /// Source indices of the original clusters.
    pub expected: usize,
    /// Of those, how many the back-projection reached.
    pub recovered: usize,
    /// Back-projected source indices outside the original clusters.
    pub spurious: usize,
}

impl QualityReport {
    pub fn recall(&self) -> f32 {
        if self.expected == 0 {
            return 1.0;
        }
        self.recovered as f32 / self.expected as f32
    }
}

/// Re-runs the projection target to source and compares the result with the
/// source clusters. Advisory only.
pub fn quality_check<S: AsRef<str>>(
    source_tokens: &[S],
    target_tokens: &[S],
    alignment: &BiAlignment,
    source_clusters: &[Cluster],
    projected: &BTreeSet<usize>,
    policy: NonalignedPolicy,
) -> QualityReport {
    let expected: BTreeSet<usize> = source_clusters.iter().flatten().copied().collect();
    let back = project_clusters(
        target_tokens,
        source_tokens,
        &alignment.swapped(),
        &runs(projected),
        policy,
    );
    let report = QualityReport {
        expected: expected.len(),
        recovered: back.intersection(&expected).count(),
        spurious: back.difference(&expected).count(),
    };
    debug!(
        expected = report.expected,
        recovered = report.recovered,
        spurious = report.spurious,
        "reverse projection"
    );
    report
}
