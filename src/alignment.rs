use std::collections::BTreeSet;

use anyhow::{anyhow, Context};

/// One Pharaoh link `i-j`.
pub type Link = (usize, usize);

pub fn parse_links(pharaoh: &str) -> anyhow::Result<Vec<Link>> {
    pharaoh
        .split_whitespace()
        .map(|item| {
            let (i, j) = item
                .split_once('-')
                .ok_or_else(|| anyhow!("alignment link without '-': {item}"))?;
            let i: usize = i
                .parse()
                .with_context(|| format!("alignment source index: {item}"))?;
            let j: usize = j
                .parse()
                .with_context(|| format!("alignment target index: {item}"))?;
            Ok((i, j))
        })
        .collect()
}

pub fn format_links(links: &[Link]) -> String {
    links
        .iter()
        .map(|(i, j)| format!("{i}-{j}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Swaps both sides of every link and sorts the result by the new source
/// index, then the new target index.
pub fn reverse_links(links: &[Link]) -> Vec<Link> {
    let mut out: Vec<Link> = links.iter().map(|&(i, j)| (j, i)).collect();
    out.sort_unstable();
    out
}

pub fn reverse_alignment(pharaoh: &str) -> anyhow::Result<String> {
    let links = parse_links(pharaoh)?;
    Ok(format_links(&reverse_links(&links)))
}

/// Word alignment seen from one side: for every token index, the set of
/// indices it links to on the other side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Alignment {
    sets: Vec<BTreeSet<usize>>,
}

impl Alignment {
    pub fn from_links(links: &[Link]) -> Self {
        let len = links.iter().map(|&(i, _)| i + 1).max().unwrap_or(0);
        let mut sets = vec![BTreeSet::new(); len];
        for &(i, j) in links {
            sets[i].insert(j);
        }
        Self { sets }
    }

    pub fn parse(pharaoh: &str) -> anyhow::Result<Self> {
        Ok(Self::from_links(&parse_links(pharaoh)?))
    }

    /// Linked indices of `index`; empty when it has none or lies past the
    /// last linked index.
    pub fn linked(&self, index: usize) -> Option<&BTreeSet<usize>> {
        self.sets.get(index)
    }

    pub fn is_linked(&self, index: usize) -> bool {
        self.sets.get(index).is_some_and(|s| !s.is_empty())
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Both directions of a sentence pair alignment, built once per pair.
#[derive(Clone, Debug, Default)]
pub struct BiAlignment {
    pub forward: Alignment,
    pub backward: Alignment,
}

impl BiAlignment {
    pub fn parse(pharaoh: &str) -> anyhow::Result<Self> {
        let links = parse_links(pharaoh)?;
        Ok(Self {
            forward: Alignment::from_links(&links),
            backward: Alignment::from_links(&reverse_links(&links)),
        })
    }

    pub fn swapped(&self) -> Self {
        Self {
            forward: self.backward.clone(),
            backward: self.forward.clone(),
        }
    }
}
