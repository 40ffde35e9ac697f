/// Wildcard-aware hostname comparison used by the binder's hostname test.
///
/// A leading `*` is a single-label wildcard. Segment counts must match when
/// either side is wildcarded. Empty or bare `*` on either side matches
/// anything.
pub fn hostnames_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() || a == "*" || b == "*" {
        return true;
    }

    let a_segments: Vec<&str> = a.split('.').collect();
    let b_segments: Vec<&str> = b.split('.').collect();

    if a_segments.len() != b_segments.len() {
        return false;
    }

    a_segments
        .iter()
        .zip(b_segments.iter())
        .enumerate()
        .all(|(i, (sa, sb))| {
            if i == 0 && (*sa == "*" || *sb == "*") {
                return true;
            }
            sa.eq_ignore_ascii_case(sb)
        })
}

/// Intersects a listener hostname with a route hostname, per the binder's
/// hostname test, returning the more specific of the two when they match.
pub fn intersect<'a>(listener: Option<&'a str>, route: Option<&'a str>) -> Option<&'a str> {
    match (listener, route) {
        (Some(l), Some(r)) if hostnames_match(l, r) => {
            if l.starts_with('*') { Some(r) } else { Some(l) }
        }
        (Some(l), None) => Some(l),
        (None, Some(r)) => Some(r),
        (None, None) => None,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::hostnames_match;
    use rstest::rstest;

    #[rstest]
    #[case("*.example.com", "foo.example.com", true)]
    #[case("*.example.com", "bar.example.com", true)]
    #[case("*.example.com", "foo.bar.example.com", false)]
    #[case("", "anything.com", true)]
    #[case("foo.com", "", true)]
    #[case("*", "foo.com", true)]
    #[case("foo.com", "foo.com", true)]
    #[case("foo.com", "bar.com", false)]
    #[case("FOO.com", "foo.COM", true)]
    fn matches_wildcard_rules(#[case] a: &str, #[case] b: &str, #[case] expected: bool) {
        assert_eq!(hostnames_match(a, b), expected);
        assert_eq!(hostnames_match(b, a), expected, "match must be symmetric");
    }
}
