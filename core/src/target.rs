//! Simplistic matching of frontend target selectors.

/// Tests whether one of the comma-separated parts of a frontend target
/// matches the tested selector.
///
/// The matching knows nothing about the actual page layout. A part matches
/// if it equals the tested selector exactly, if it is `html`, or if it is
/// `body` and the tested selector is not one of the metadata elements that
/// live outside the body.
///
/// Runs in linear time regardless of input shape.
pub(crate) fn test_target(frontend_target: &str, tested_target: &str) -> bool {
    frontend_target.split(',').any(|part| {
        let part = strip_pseudo_suffix(part.trim());
        part == tested_target
            || part == "html"
            || (part == "body" && !matches!(tested_target, "head" | "title" | "meta"))
    })
}

/// Removes one trailing `:pseudo` suffix, so `main:before` compares equal
/// to `main`. A part that starts with the colon (like `:none`) is a
/// selector of its own and stays untouched.
fn strip_pseudo_suffix(part: &str) -> &str {
    let Some(index) = part.rfind(':') else {
        return part;
    };
    if index == 0 {
        return part;
    }
    let suffix = &part[index + 1..];
    if !suffix.is_empty() && suffix.bytes().all(|byte| byte.is_ascii_lowercase() || byte == b'-') {
        &part[..index]
    } else {
        part
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn matches_an_exact_selector() {
        assert!(test_target(".foo", ".foo"));
        assert!(!test_target(".foo", ".bar"));
    }

    #[test]
    fn any_part_of_a_selector_list_can_match() {
        assert!(test_target(".foo, .bar", ".bar"));
        assert!(test_target(".foo,.bar", ".bar"));
        assert!(!test_target(".foo, .bar", ".baz"));
    }

    #[test]
    fn html_matches_any_selector() {
        assert!(test_target("html", ".foo"));
        assert!(test_target("html", "head"));
    }

    #[test]
    fn body_matches_everything_except_head_metadata() {
        assert!(test_target("body", ".foo"));
        assert!(test_target("body", "div"));
        assert!(!test_target("body", "head"));
        assert!(!test_target("body", "title"));
        assert!(!test_target("body", "meta"));
    }

    #[test]
    fn pseudo_suffixes_are_ignored_for_matching() {
        assert!(test_target(".foo:before", ".foo"));
        assert!(test_target("main:after", "main"));
        assert!(!test_target(".foo:before", ".foo:before-ish"));
    }

    #[test]
    fn a_leading_colon_is_part_of_the_selector() {
        assert!(test_target(":main", ":main"));
        assert!(!test_target(":none", "main"));
    }

    #[test]
    fn attribute_values_with_colons_are_not_treated_as_pseudos() {
        assert!(test_target("input[name='a:b']", "input[name='a:b']"));
    }

    #[test]
    fn handles_large_adversarial_selectors() {
        let huge = ".x,".repeat(16_000) + ".needle";

        assert!(test_target(&huge, ".needle"));
        assert!(!test_target(&huge, ".missing"));
    }
}
