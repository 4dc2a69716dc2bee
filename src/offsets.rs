use crate::sentinels::{Marker, TagPair};

/// Whitespace-insensitive start offset of every token: `offsets[i]` is the
/// number of characters in `tokens[..i]`.
pub fn token_offsets<S: AsRef<str>>(tokens: &[S]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(tokens.len());
    let mut pos = 0usize;
    for tok in tokens {
        offsets.push(pos);
        pos += tok.as_ref().chars().count();
    }
    offsets
}

/// Offsets collected for the text since the last marker.
#[derive(Debug)]
struct Segment {
    offsets: Vec<usize>,
    has_text: bool,
    after_space: bool,
}

impl Segment {
    fn starting_at(pos: usize) -> Self {
        Self {
            offsets: vec![pos],
            has_text: false,
            after_space: false,
        }
    }

    fn push_char(&mut self, ch: char, pos: usize) -> bool {
        if ch.is_whitespace() {
            self.after_space = true;
            return false;
        }
        if self.has_text && self.after_space {
            self.offsets.push(pos);
        }
        self.has_text = true;
        self.after_space = false;
        true
    }
}

/// Scans a tagged string and returns, for every tagged span, the
/// whitespace-insensitive offset of its first character followed by the
/// offset of each further word inside it.
///
/// A close marker met outside a span closes the text read since the previous
/// marker (or the start of the string). A span still open at the end of the
/// string contributes nothing.
pub fn locate_spans(tagged: &str, tags: &TagPair) -> Vec<usize> {
    let mut out: Vec<usize> = Vec::new();
    let mut pos = 0usize;
    let mut segment = Segment::starting_at(0);

    let mut i = 0usize;
    while i < tagged.len() {
        let rest = &tagged[i..];
        if let Some((marker, len)) = tags.marker_at(rest) {
            if marker == Marker::Close {
                out.append(&mut segment.offsets);
            }
            segment = Segment::starting_at(pos);
            i += len;
            continue;
        }
        let Some(ch) = rest.chars().next() else {
            break;
        };
        if segment.push_char(ch, pos) {
            pos += 1;
        }
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{locate_spans, token_offsets};
    use crate::sentinels::TagPair;

    #[test]
    fn offsets_accumulate_token_lengths() {
        assert_eq!(token_offsets(&["John", "Smith", "called", "."]), vec![0, 4, 9, 15]);
        assert!(token_offsets::<&str>(&[]).is_empty());
        assert_eq!(token_offsets(&["Pérez", "¿"]), vec![0, 5]);
    }

    #[test]
    fn locates_span_start_and_inner_words() {
        let tags = TagPair::default();
        let offs = locate_spans("<entity>John Smith</entity> called.", &tags);
        assert_eq!(offs, vec![0, 4]);

        let offs = locate_spans("Call <entity>Ann</entity> or <entity>Bob Lee Ray</entity>", &tags);
        assert_eq!(offs, vec![4, 9, 12, 15]);
    }

    #[test]
    fn whitespace_does_not_shift_offsets() {
        let tags = TagPair::default();
        let offs = locate_spans("a  <entity>  b   c </entity> d", &tags);
        assert_eq!(offs, vec![1, 2]);
    }

    #[test]
    fn dangling_close_tags_text_since_last_marker() {
        let tags = TagPair::default();
        let offs = locate_spans("Ann Lee</entity> left", &tags);
        assert_eq!(offs, vec![0, 3]);
    }

    #[test]
    fn unclosed_tag_at_end_contributes_nothing() {
        let tags = TagPair::default();
        assert_eq!(locate_spans("hi <entity>Bob", &tags), Vec::<usize>::new());
        assert_eq!(locate_spans("<entity>Al</entity> hi <entity>Bob Lee", &tags), vec![0]);
        assert_eq!(locate_spans("hi <entity>  ", &tags), Vec::<usize>::new());
        assert_eq!(locate_spans("<entity>A</entity> hi <entity>", &tags), vec![0]);
    }

    #[test]
    fn custom_markers() {
        let tags = TagPair::new("[[", "]]").expect("tags");
        assert_eq!(locate_spans("x [[y z]] w", &tags), vec![1, 2]);
    }
}
