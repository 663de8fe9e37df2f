//! Path segmentation.
//!
//! Lookup works on byte ranges into the request path so the hot path
//! never allocates per segment; registration works on owned strings.
//! Nothing here percent-decodes: parameter and wildcard values are raw
//! segment bytes, and decoding is the handler's concern.

/// Upper bound on segments per path. Anything deeper is treated as
/// unroutable rather than fed to the tree.
pub(crate) const MAX_SEGMENTS: usize = 100;

/// Splits a path into `(start, end)` byte ranges, one per segment.
///
/// The leading `/` is consumed and runs of `/` produce no empty
/// segments, so `""` and `"/"` both yield zero ranges. Returns `None`
/// when the path exceeds [`MAX_SEGMENTS`].
pub(crate) fn segment_bounds(path: &str) -> Option<Vec<(usize, usize)>> {
    let bytes = path.as_bytes();
    let mut bounds = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i] == b'/' {
            i += 1;
        }
        if i == bytes.len() {
            break;
        }
        let start = i;
        while i < bytes.len() && bytes[i] != b'/' {
            i += 1;
        }
        if bounds.len() == MAX_SEGMENTS {
            return None;
        }
        bounds.push((start, i));
    }
    Some(bounds)
}

/// Splits a registration pattern into owned segments.
pub(crate) fn pattern_segments(pattern: &str) -> Vec<String> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One piece of an embedded-parameter segment.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PatternPart {
    Literal(String),
    Param(String),
}

/// Decomposes a segment containing `:` into alternating literals and
/// parameter names. A parameter name is a run of ASCII alphanumerics
/// and underscores; the first other character ends the name and starts
/// the next literal, which is what lets one segment carry a literal
/// between two parameters (`user:id-post:postId`).
///
/// Panics on an empty parameter name or a `*` inside the segment; both
/// are registration-time programmer errors.
pub(crate) fn parse_embedded(segment: &str) -> Vec<PatternPart> {
    let bytes = segment.as_bytes();
    let mut parts = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && is_name_byte(bytes[end]) {
                end += 1;
            }
            if end == start {
                panic!("empty parameter name in route segment '{}'", segment);
            }
            parts.push(PatternPart::Param(segment[start..end].to_string()));
            i = end;
        } else {
            let start = i;
            while i < bytes.len() && bytes[i] != b':' && bytes[i] != b'*' {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b'*' {
                panic!(
                    "wildcard must start its own terminal segment, found '*' in '{}'",
                    segment
                );
            }
            parts.push(PatternPart::Literal(segment[start..i].to_string()));
        }
    }
    parts
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
