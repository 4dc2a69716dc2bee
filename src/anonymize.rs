use serde::Serialize;

use crate::cluster::{condense, sorted_by_start};
use crate::offsets::{locate_spans, token_offsets};
use crate::sentinels::{Marker, TagPair};

/// One anonymized mention: where it sat in the original tokens and where its
/// placeholder sits in the anonymized tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MappingRecord {
    pub orig_start: usize,
    pub orig_end: usize,
    pub original: String,
    pub anon_start: usize,
    pub anon_end: usize,
    pub placeholder: String,
}

impl MappingRecord {
    pub fn token_count(&self) -> usize {
        self.orig_end - self.orig_start + 1
    }

    /// The record as six flat fields.
    pub fn fields(&self) -> [String; 6] {
        [
            self.orig_start.to_string(),
            self.orig_end.to_string(),
            self.original.clone(),
            self.anon_start.to_string(),
            self.anon_end.to_string(),
            self.placeholder.clone(),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Anonymized {
    pub tokens: Vec<String>,
    pub text: String,
    pub mapping: Vec<MappingRecord>,
}

impl Anonymized {
    pub fn joined_tokens(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Flattens a mapping table into tab-separated fields.
pub fn flatten_mapping(mapping: &[MappingRecord]) -> String {
    mapping
        .iter()
        .flat_map(MappingRecord::fields)
        .collect::<Vec<_>>()
        .join("\t")
}

/// Replaces the tagged mentions of a sentence by `placeholder`.
///
/// `tokens` and `tokens_lc` are the same tokenization in original and lower
/// case; only the latter is used to line up offsets with `tagged`, the
/// non-tokenized sentence carrying tag markers.
pub fn anonymize(
    tokens: &str,
    tokens_lc: &str,
    tagged: &str,
    tags: &TagPair,
    placeholder: &str,
) -> Anonymized {
    let toks: Vec<&str> = tokens.split_whitespace().collect();
    let toks_lc: Vec<&str> = tokens_lc.split_whitespace().collect();
    let clusters = sorted_by_start(condense(
        &locate_spans(tagged, tags),
        &token_offsets(&toks_lc),
    ));

    let mut out: Vec<String> = Vec::with_capacity(toks.len());
    let mut mapping: Vec<MappingRecord> = Vec::with_capacity(clusters.len());
    let mut removed = 0usize;
    let mut cursor = 0usize;
    for cluster in &clusters {
        let (Some(&lo), Some(&hi)) = (cluster.first(), cluster.last()) else {
            continue;
        };
        if lo >= toks.len() || lo < cursor {
            continue;
        }
        let hi = hi.min(toks.len() - 1);
        out.extend(toks[cursor..lo].iter().map(|t| t.to_string()));
        out.push(placeholder.to_string());
        mapping.push(MappingRecord {
            orig_start: lo,
            orig_end: hi,
            original: toks[lo..=hi].join(" "),
            anon_start: lo - removed,
            anon_end: lo - removed,
            placeholder: placeholder.to_string(),
        });
        removed += hi - lo;
        cursor = hi + 1;
    }
    if cursor < toks.len() {
        out.extend(toks[cursor..].iter().map(|t| t.to_string()));
    }

    Anonymized {
        tokens: out,
        text: replace_tagged(tagged, tags, placeholder),
        mapping,
    }
}

/// Non-tokenized anonymization: every tagged segment becomes `placeholder`,
/// untagged text is kept verbatim. Stray close markers are dropped.
pub fn replace_tagged(tagged: &str, tags: &TagPair, placeholder: &str) -> String {
    let mut out = String::with_capacity(tagged.len());
    let mut inside = false;
    let mut i = 0usize;
    while i < tagged.len() {
        let rest = &tagged[i..];
        if let Some((marker, len)) = tags.marker_at(rest) {
            match marker {
                Marker::Open if !inside => {
                    out.push_str(placeholder);
                    inside = true;
                }
                Marker::Close => inside = false,
                Marker::Open => {}
            }
            i += len;
            continue;
        }
        let Some(ch) = rest.chars().next() else {
            break;
        };
        if !inside {
            out.push(ch);
        }
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{anonymize, flatten_mapping, replace_tagged, MappingRecord};
    use crate::sentinels::{TagPair, DEFAULT_PLACEHOLDER};

    fn run(tokens: &str, tagged: &str) -> super::Anonymized {
        let lc = tokens.to_lowercase();
        anonymize(tokens, &lc, tagged, &TagPair::default(), DEFAULT_PLACEHOLDER)
    }

    #[test]
    fn single_leading_entity() {
        let a = run("Alice went home", "<entity>Alice</entity> went home");
        assert_eq!(a.joined_tokens(), "__ENTITY__ went home");
        assert_eq!(a.text, "__ENTITY__ went home");
        assert_eq!(
            a.mapping,
            vec![MappingRecord {
                orig_start: 0,
                orig_end: 0,
                original: "Alice".into(),
                anon_start: 0,
                anon_end: 0,
                placeholder: "__ENTITY__".into(),
            }]
        );
    }

    #[test]
    fn placeholder_positions_shift_after_multi_token_mentions() {
        let a = run(
            "John Smith met Mary Ann Lee today .",
            "<entity>John Smith</entity> met <entity>Mary Ann Lee</entity> today.",
        );
        assert_eq!(a.joined_tokens(), "__ENTITY__ met __ENTITY__ today .");
        assert_eq!(a.text, "__ENTITY__ met __ENTITY__ today.");
        assert_eq!(
            flatten_mapping(&a.mapping),
            "0\t1\tJohn Smith\t0\t0\t__ENTITY__\t3\t5\tMary Ann Lee\t2\t2\t__ENTITY__"
        );
    }

    #[test]
    fn keeps_single_trailing_token() {
        // the final token must survive when the mention ends right before it
        let a = run("I saw Bob .", "I saw <entity>Bob</entity>.");
        assert_eq!(a.joined_tokens(), "I saw __ENTITY__ .");
        let a = run("Bob", "<entity>Bob</entity>");
        assert_eq!(a.joined_tokens(), "__ENTITY__");
    }

    #[test]
    fn untagged_sentence_is_unchanged() {
        let a = run("nothing here", "nothing here");
        assert_eq!(a.joined_tokens(), "nothing here");
        assert!(a.mapping.is_empty());
        assert_eq!(flatten_mapping(&a.mapping), "");
    }

    #[test]
    fn original_case_comes_from_raw_tokens() {
        let a = anonymize(
            "Visit PARIS now",
            "visit paris now",
            "Visit <entity>PARIS</entity> now",
            &TagPair::default(),
            "<X>",
        );
        assert_eq!(a.mapping[0].original, "PARIS");
        assert_eq!(a.joined_tokens(), "Visit <X> now");
    }

    #[test]
    fn replace_tagged_handles_strays() {
        let tags = TagPair::default();
        assert_eq!(replace_tagged("a <entity>b</entity> c", &tags, "P"), "a P c");
        assert_eq!(replace_tagged("a </entity>b", &tags, "P"), "a b");
        assert_eq!(replace_tagged("a <entity>b", &tags, "P"), "a P");
        assert_eq!(replace_tagged("<entity></entity>", &tags, "P"), "P");
    }
}
