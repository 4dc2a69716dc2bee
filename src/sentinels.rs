use anyhow::anyhow;
use regex::Regex;

pub const DEFAULT_OPEN_TAG: &str = "<entity>";
pub const DEFAULT_CLOSE_TAG: &str = "</entity>";
pub const DEFAULT_PLACEHOLDER: &str = "__ENTITY__";

pub const SRC_MAP_LABEL: &str = "__srcmap__";
pub const TRG_MAP_LABEL: &str = "__trgmap__";

/// Open/close marker pair wrapping entity spans inside a sentence.
#[derive(Clone, Debug)]
pub struct TagPair {
    open: String,
    close: String,
    merge_re: Regex,
}

impl TagPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> anyhow::Result<Self> {
        let open = open.into();
        let close = close.into();
        if open.is_empty() || close.is_empty() {
            return Err(anyhow!("tag markers must not be empty"));
        }
        if open == close {
            return Err(anyhow!("open and close markers must differ: {open}"));
        }
        if open.contains(&close) || close.contains(&open) {
            return Err(anyhow!(
                "one tag marker must not contain the other: {open} / {close}"
            ));
        }
        // close, optional spaces, optional single hyphen or slash, optional spaces, open
        let pat = format!(
            "{}( *[-/]? *){}",
            regex::escape(&close),
            regex::escape(&open)
        );
        let merge_re = Regex::new(&pat).map_err(|e| anyhow!("continuity regex: {e}"))?;
        Ok(Self {
            open,
            close,
            merge_re,
        })
    }

    #[inline]
    pub fn open(&self) -> &str {
        &self.open
    }

    #[inline]
    pub fn close(&self) -> &str {
        &self.close
    }

    pub(crate) fn merge_re(&self) -> &Regex {
        &self.merge_re
    }

    pub fn wrap(&self, text: &str) -> String {
        let mut out = String::with_capacity(self.open.len() + text.len() + self.close.len());
        out.push_str(&self.open);
        out.push_str(text);
        out.push_str(&self.close);
        out
    }

    pub fn strip(&self, text: &str) -> String {
        text.replace(&self.open, "").replace(&self.close, "")
    }

    /// Returns `(opens, closes)` marker counts.
    pub fn count_markers(&self, text: &str) -> (usize, usize) {
        (text.matches(&self.open).count(), text.matches(&self.close).count())
    }
}

impl Default for TagPair {
    fn default() -> Self {
        Self::new(DEFAULT_OPEN_TAG, DEFAULT_CLOSE_TAG).expect("default tag pair")
    }
}

/// Marker found at the head of `rest`, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Marker {
    Open,
    Close,
}

impl TagPair {
    pub(crate) fn marker_at(&self, rest: &str) -> Option<(Marker, usize)> {
        if rest.starts_with(self.open.as_str()) {
            Some((Marker::Open, self.open.len()))
        } else if rest.starts_with(self.close.as_str()) {
            Some((Marker::Close, self.close.len()))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TagPair;

    #[test]
    fn rejects_bad_marker_pairs() {
        assert!(TagPair::new("", "</e>").is_err());
        assert!(TagPair::new("<e>", "<e>").is_err());
        assert!(TagPair::new("<e>", "<e>>").is_err());
        assert!(TagPair::new("[[", "]]").is_ok());
    }

    #[test]
    fn strip_and_count() {
        let tags = TagPair::default();
        let s = "<entity>Ann</entity> and <entity>Bob";
        assert_eq!(tags.strip(s), "Ann and Bob");
        assert_eq!(tags.count_markers(s), (2, 1));
        assert_eq!(tags.wrap("x"), "<entity>x</entity>");
    }
}
