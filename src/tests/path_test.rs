use crate::router::path::{
    MAX_SEGMENTS, PatternPart, parse_embedded, pattern_segments, segment_bounds,
};

#[test]
fn empty_and_root_yield_no_segments() {
    assert_eq!(segment_bounds("").unwrap(), vec![]);
    assert_eq!(segment_bounds("/").unwrap(), vec![]);
}

#[test]
fn leading_slash_and_runs_are_collapsed() {
    let path = "/a//b///c";
    let bounds = segment_bounds(path).unwrap();
    let segments: Vec<&str> = bounds.iter().map(|(s, e)| &path[*s..*e]).collect();
    assert_eq!(segments, vec!["a", "b", "c"]);
}

#[test]
fn bounds_point_into_the_raw_path() {
    let path = "/files/a%2Fb.txt";
    let bounds = segment_bounds(path).unwrap();
    assert_eq!(&path[bounds[1].0..bounds[1].1], "a%2Fb.txt");
}

#[test]
fn trailing_slash_adds_no_segment() {
    let path = "/users/";
    let bounds = segment_bounds(path).unwrap();
    assert_eq!(bounds.len(), 1);
}

#[test]
fn segment_count_is_bounded() {
    let mut path = String::new();
    for i in 0..MAX_SEGMENTS {
        path.push_str(&format!("/s{}", i));
    }
    assert!(segment_bounds(&path).is_some());
    path.push_str("/one-too-many");
    assert!(segment_bounds(&path).is_none());
}

#[test]
fn pattern_segments_drop_empties() {
    assert_eq!(pattern_segments("/"), Vec::<String>::new());
    assert_eq!(pattern_segments("/a/:b/*c"), vec!["a", ":b", "*c"]);
}

#[test]
fn embedded_parse_alternates_literals_and_params() {
    let parts = parse_embedded("user:id-post:postId");
    assert_eq!(
        parts,
        vec![
            PatternPart::Literal("user".to_string()),
            PatternPart::Param("id".to_string()),
            PatternPart::Literal("-post".to_string()),
            PatternPart::Param("postId".to_string()),
        ]
    );
}

#[test]
fn embedded_parse_handles_adjacent_params() {
    let parts = parse_embedded("prefix:a:b");
    assert_eq!(
        parts,
        vec![
            PatternPart::Literal("prefix".to_string()),
            PatternPart::Param("a".to_string()),
            PatternPart::Param("b".to_string()),
        ]
    );
}

#[test]
#[should_panic(expected = "empty parameter name")]
fn embedded_parse_rejects_empty_names() {
    parse_embedded("user::id");
}

#[test]
#[should_panic(expected = "wildcard")]
fn embedded_parse_rejects_inline_wildcards() {
    parse_embedded("user:id*rest");
}
