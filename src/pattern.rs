//! Uniform "find a span in a buffer" abstraction over literal bytes, a
//! compiled byte-regex, or a predicate.

use regex::bytes::Regex;
use std::sync::Arc;

/// A span `[start, end)` within a buffer. `None` means "not found", mirroring
/// the source's `(-1, -1)` sentinel.
pub type Span = Option<(usize, usize)>;

/// Something that can locate a span in a byte buffer.
#[derive(Clone)]
pub enum Pattern {
    Literal(Vec<u8>),
    Regex(Regex),
    Predicate(Arc<dyn Fn(&[u8]) -> Span + Send + Sync>),
}

impl Pattern {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Pattern::Literal(bytes.into())
    }

    pub fn regex(re: Regex) -> Self {
        Pattern::Regex(re)
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&[u8]) -> Span + Send + Sync + 'static,
    {
        Pattern::Predicate(Arc::new(f))
    }

    /// Returns the earliest-found span for this single pattern.
    fn find(&self, buf: &[u8]) -> Span {
        match self {
            Pattern::Literal(lit) => {
                if lit.is_empty() {
                    return None;
                }
                find_subslice(buf, lit).map(|start| (start, start + lit.len()))
            }
            Pattern::Regex(re) => re.find(buf).map(|m| (m.start(), m.end())),
            Pattern::Predicate(f) => f(buf),
        }
    }
}

impl From<&[u8]> for Pattern {
    fn from(bytes: &[u8]) -> Self {
        Pattern::literal(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Pattern {
    fn from(bytes: Vec<u8>) -> Self {
        Pattern::literal(bytes)
    }
}

impl<const N: usize> From<&[u8; N]> for Pattern {
    fn from(bytes: &[u8; N]) -> Self {
        Pattern::literal(bytes.to_vec())
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Returns the span matched by the earliest-found pattern in `buf`.
///
/// For a single pattern this is simply its earliest occurrence. For a list of
/// patterns, each is tried in declaration order on the same buffer extension
/// and the *first pattern that matches* wins — not the pattern whose match
/// starts at the earliest byte offset. This tie-break is observable and is
/// preserved deliberately (spec §4.2, property 7).
pub fn match_pattern(patterns: &[Pattern], buf: &[u8]) -> Option<(usize, (usize, usize))> {
    for (idx, p) in patterns.iter().enumerate() {
        if let Some(span) = p.find(buf) {
            return Some((idx, span));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_finds_first_occurrence() {
        let p = Pattern::literal(b"bc".to_vec());
        let buf = b"abcabc";
        assert_eq!(match_pattern(&[p], buf), Some((0, (1, 3))));
    }

    #[test]
    fn literal_not_found_returns_none() {
        let p = Pattern::literal(b"zz".to_vec());
        assert_eq!(match_pattern(&[p], b"abc"), None);
    }

    #[test]
    fn regex_pattern_matches() {
        let re = Regex::new(r"\d+").unwrap();
        let p = Pattern::regex(re);
        let (idx, (start, end)) = match_pattern(&[p], b"abc123def").unwrap();
        assert_eq!(idx, 0);
        assert_eq!((start, end), (3, 6));
    }

    #[test]
    fn predicate_pattern() {
        let p = Pattern::predicate(|buf: &[u8]| {
            buf.iter().position(|&b| b == b'!').map(|i| (i, i + 1))
        });
        assert_eq!(match_pattern(&[p], b"hi!"), Some((0, (2, 3))));
    }

    #[test]
    fn list_tie_break_prefers_declaration_order_not_earliest_offset() {
        // p1 matches later in the buffer than p2, but is declared first and
        // must win per spec §4.2 / property 7.
        let p1 = Pattern::literal(b"late".to_vec());
        let p2 = Pattern::literal(b"early".to_vec());
        let buf = b"earlylate";
        let (idx, span) = match_pattern(&[p1, p2], buf).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(span, (5, 9));
    }

    #[test]
    fn list_falls_through_to_second_pattern_when_first_absent() {
        let p1 = Pattern::literal(b"zzz".to_vec());
        let p2 = Pattern::literal(b"abc".to_vec());
        let (idx, span) = match_pattern(&[p1, p2], b"xabcx").unwrap();
        assert_eq!(idx, 1);
        assert_eq!(span, (1, 4));
    }
}
