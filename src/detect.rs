use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::{anyhow, Context};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::sentinels::TagPair;

/// Where a detected span came from. Pattern spans bypass the label allow-list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanSource {
    Pattern,
    Model,
}

/// Detected mention: byte range (on char boundaries) into the untagged text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub source: SpanSource,
}

/// Anything that finds entity mentions in raw sentence text.
pub trait EntityDetector: Send + Sync {
    fn detect(&self, text: &str) -> Vec<EntitySpan>;
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:\b|^)[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*(?:\b|$)",
    )
    .expect("email regex")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[+\-–(\d].[()' +\-–\d]{5,12}\d{2}\b").expect("phone regex")
});

// Date-like "dddd-dddd" runs are not phone numbers.
static PHONE_REJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{4}").expect("phone reject regex"));

static IPV4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:[0-9]{1,3}\.){3}[0-9]{1,3}").expect("ipv4 regex"));

static IPV6_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}|(?:[0-9a-fA-F]{1,4}:){1,7}:|(?:[0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4}|(?:[0-9a-fA-F]{1,4}:){1,5}(?::[0-9a-fA-F]{1,4}){1,2}|(?:[0-9a-fA-F]{1,4}:){1,4}(?::[0-9a-fA-F]{1,4}){1,3}|(?:[0-9a-fA-F]{1,4}:){1,3}(?::[0-9a-fA-F]{1,4}){1,4}|(?:[0-9a-fA-F]{1,4}:){1,2}(?::[0-9a-fA-F]{1,4}){1,5}|[0-9a-fA-F]{1,4}:(?:(?::[0-9a-fA-F]{1,4}){1,6})|:(?:(?::[0-9a-fA-F]{1,4}){1,7}|:)|fe80:(?::[0-9a-fA-F]{0,4}){0,4}%[0-9a-zA-Z]+|::(?:ffff(?::0{1,4})?:)?(?:(?:25[0-5]|(?:2[0-4]|1?[0-9])?[0-9])\.){3}(?:25[0-5]|(?:2[0-4]|1?[0-9])?[0-9])|(?:[0-9a-fA-F]{1,4}:){1,4}:(?:(?:25[0-5]|(?:2[0-4]|1?[0-9])?[0-9])\.){3}(?:25[0-5]|(?:2[0-4]|1?[0-9])?[0-9])",
    )
    .expect("ipv6 regex")
});

/// Email, phone, IPv4 and IPv6 patterns.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegexDetector;

impl RegexDetector {
    fn patterns() -> [(&'static str, &'static Lazy<Regex>); 4] {
        [
            ("EMAIL", &EMAIL_RE),
            ("PHONE", &PHONE_RE),
            ("IPV4", &IPV4_RE),
            ("IPV6", &IPV6_RE),
        ]
    }
}

fn find_phones(text: &str, out: &mut Vec<EntitySpan>) {
    let mut at = 0usize;
    while at < text.len() {
        let Some(m) = PHONE_RE.find_at(text, at) else {
            break;
        };
        if PHONE_REJECT_RE.is_match(m.as_str()) {
            // retry one char further, as a look-ahead would
            at = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
            continue;
        }
        out.push(EntitySpan {
            start: m.start(),
            end: m.end(),
            label: "PHONE".to_string(),
            source: SpanSource::Pattern,
        });
        at = m.end().max(m.start() + 1);
    }
}

impl EntityDetector for RegexDetector {
    fn detect(&self, text: &str) -> Vec<EntitySpan> {
        let mut out = Vec::new();
        for (label, re) in Self::patterns() {
            if label == "PHONE" {
                find_phones(text, &mut out);
                continue;
            }
            out.extend(re.find_iter(text).map(|m| EntitySpan {
                start: m.start(),
                end: m.end(),
                label: label.to_string(),
                source: SpanSource::Pattern,
            }));
        }
        out
    }
}

/// Stateless dictionary tagger standing in for a statistical recognizer:
/// longest phrase wins, matches must sit on word boundaries.
#[derive(Clone, Debug)]
pub struct GlossaryDetector {
    re: Option<Regex>,
    labels: HashMap<String, String>,
}

impl GlossaryDetector {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> anyhow::Result<Self> {
        let mut labels: HashMap<String, String> = HashMap::new();
        for (phrase, label) in entries {
            let phrase = phrase.trim();
            let label = label.trim();
            if phrase.is_empty() || label.is_empty() {
                continue;
            }
            labels.entry(phrase.to_string()).or_insert_with(|| label.to_string());
        }
        if labels.is_empty() {
            return Ok(Self { re: None, labels });
        }
        let mut phrases: Vec<&String> = labels.keys().collect();
        phrases.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alt = phrases
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        let re = Regex::new(&format!(r"\b(?:{alt})\b")).context("compile glossary regex")?;
        Ok(Self {
            re: Some(re),
            labels,
        })
    }

    /// Reads `phrase<TAB>label` lines; blank lines and `#` comments are skipped.
    pub fn from_tsv(text: &str) -> anyhow::Result<Self> {
        let mut entries = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let (phrase, label) = line
                .split_once('\t')
                .ok_or_else(|| anyhow!("glossary line {}: expected phrase<TAB>label", n + 1))?;
            entries.push((phrase.to_string(), label.to_string()));
        }
        Self::new(entries)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read glossary: {}", path.display()))?;
        Self::from_tsv(&text).with_context(|| format!("parse glossary: {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl EntityDetector for GlossaryDetector {
    fn detect(&self, text: &str) -> Vec<EntitySpan> {
        let Some(re) = self.re.as_ref() else {
            return Vec::new();
        };
        re.find_iter(text)
            .filter_map(|m| {
                let label = self.labels.get(m.as_str())?;
                Some(EntitySpan {
                    start: m.start(),
                    end: m.end(),
                    label: label.clone(),
                    source: SpanSource::Model,
                })
            })
            .collect()
    }
}

/// Model labels that count as entities.
#[derive(Clone, Debug)]
pub struct LabelFilter {
    allowed: BTreeSet<String>,
}

impl LabelFilter {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: labels
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn accepts(&self, span: &EntitySpan) -> bool {
        span.source == SpanSource::Pattern || self.allowed.contains(&span.label)
    }
}

impl Default for LabelFilter {
    fn default() -> Self {
        Self::new(["PERSON"])
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaggedSentence {
    pub text: String,
    /// Accepted mentions, overlapping ones included.
    pub accepted: usize,
}

/// Runs every detector over `text` and wraps accepted, non-overlapping spans
/// in tag markers. Among overlapping spans the earliest-starting one wins.
pub fn tag_entities(
    text: &str,
    detectors: &[&dyn EntityDetector],
    filter: &LabelFilter,
    tags: &TagPair,
) -> TaggedSentence {
    let mut spans: Vec<EntitySpan> = detectors.iter().flat_map(|d| d.detect(text)).collect();
    spans.sort_by_key(|s| (s.start, s.end));

    let mut out = String::with_capacity(text.len() + 32);
    let mut cur = 0usize;
    let mut accepted = 0usize;
    for span in &spans {
        if !filter.accepts(span) {
            continue;
        }
        let valid = span.start < span.end
            && span.end <= text.len()
            && text.is_char_boundary(span.start)
            && text.is_char_boundary(span.end);
        if !valid {
            continue;
        }
        accepted += 1;
        if span.start < cur {
            continue;
        }
        out.push_str(&text[cur..span.start]);
        out.push_str(&tags.wrap(&text[span.start..span.end]));
        cur = span.end;
    }
    out.push_str(&text[cur..]);
    TaggedSentence {
        text: out,
        accepted,
    }
}
