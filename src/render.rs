use std::collections::BTreeSet;

use crate::sentinels::TagPair;

/// Whitespace-insensitive character range of one token to wrap in tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPoint {
    pub start: usize,
    pub end: usize,
}

/// Points for the projected token indices, in ascending order. Indices past
/// the token sequence are ignored.
pub fn projection_points<S: AsRef<str>>(
    token_offsets: &[usize],
    tokens: &[S],
    indices: &BTreeSet<usize>,
) -> Vec<ProjectionPoint> {
    let mut points: Vec<ProjectionPoint> = indices
        .iter()
        .filter_map(|&i| {
            let start = *token_offsets.get(i)?;
            let len = tokens.get(i)?.as_ref().chars().count();
            Some(ProjectionPoint {
                start,
                end: start + len,
            })
        })
        .collect();
    points.sort_unstable();
    points.dedup();
    points
}

/// Inserts open/close markers into `text` around every point. The output is
/// always balanced.
pub fn render_tags(text: &str, points: &[ProjectionPoint], tags: &TagPair) -> String {
    let mut out = String::with_capacity(text.len() + points.len() * 2 * tags.open().len());
    let mut offset = 0usize;
    let mut open_i = 0usize;
    let mut close_i = 0usize;

    let mut chars = text.chars().peekable();
    while let Some(&ch) = chars.peek() {
        // a start we walked past without opening cannot be tagged any more
        while open_i == close_i && open_i < points.len() && points[open_i].start < offset {
            open_i += 1;
            close_i += 1;
        }
        if close_i < points.len() && open_i != close_i && offset == points[close_i].end {
            out.push_str(tags.close());
            close_i += 1;
            continue;
        }
        let is_space = ch.is_whitespace();
        if open_i < points.len() && points[open_i].start == offset && !is_space {
            out.push_str(tags.open());
            open_i += 1;
        }
        out.push(ch);
        if !is_space {
            offset += 1;
        }
        chars.next();
    }

    for _ in close_i..open_i {
        out.push_str(tags.close());
    }
    out
}

/// Joins two tagged fragments separated only by spaces and at most one
/// hyphen or slash into a single span.
pub fn merge_continuous(text: &str, tags: &TagPair) -> String {
    tags.merge_re().replace_all(text, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{merge_continuous, projection_points, render_tags, ProjectionPoint};
    use crate::offsets::token_offsets;
    use crate::sentinels::TagPair;

    fn pt(start: usize, end: usize) -> ProjectionPoint {
        ProjectionPoint { start, end }
    }

    #[test]
    fn points_follow_token_offsets() {
        let toks = ["Juan", "Pérez", "llamó", "."];
        let offs = token_offsets(&toks);
        let idx: BTreeSet<usize> = [1, 0, 9].into_iter().collect();
        assert_eq!(projection_points(&offs, &toks, &idx), vec![pt(0, 4), pt(4, 9)]);
    }

    #[test]
    fn wraps_each_token_then_merges() {
        let tags = TagPair::default();
        let out = render_tags("Juan Pérez llamó .", &[pt(0, 4), pt(4, 9)], &tags);
        assert_eq!(out, "<entity>Juan</entity> <entity>Pérez</entity> llamó .");
        assert_eq!(merge_continuous(&out, &tags), "<entity>Juan Pérez</entity> llamó .");
    }

    #[test]
    fn closes_span_reaching_end_of_string() {
        let tags = TagPair::default();
        let out = render_tags("vio a Ana", &[pt(4, 7)], &tags);
        assert_eq!(out, "vio a <entity>Ana</entity>");
    }

    #[test]
    fn tokens_glued_to_punctuation() {
        let tags = TagPair::default();
        // tokens: Hola , Ana .
        let out = render_tags("Hola, Ana.", &[pt(5, 8)], &tags);
        assert_eq!(out, "Hola, <entity>Ana</entity>.");
    }

    #[test]
    fn skips_points_the_text_cannot_hold() {
        let tags = TagPair::default();
        let out = render_tags("ab", &[pt(0, 1), pt(5, 6)], &tags);
        assert_eq!(out, "<entity>a</entity>b");
        let out = render_tags("", &[pt(0, 1)], &tags);
        assert_eq!(out, "");
    }

    #[test]
    fn merge_handles_connectors() {
        let tags = TagPair::default();
        assert_eq!(
            merge_continuous("<entity>A</entity> - <entity>B</entity>", &tags),
            "<entity>A - B</entity>"
        );
        assert_eq!(
            merge_continuous("<entity>A</entity>/<entity>B</entity>", &tags),
            "<entity>A/B</entity>"
        );
        assert_eq!(
            merge_continuous("<entity>A</entity> y <entity>B</entity>", &tags),
            "<entity>A</entity> y <entity>B</entity>"
        );
    }

    #[test]
    fn merge_with_custom_markers() {
        let tags = TagPair::new("[e]", "[/e]").unwrap();
        assert_eq!(merge_continuous("[e]a[/e] [e]b[/e]", &tags), "[e]a b[/e]");
    }
}
