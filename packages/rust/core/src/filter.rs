//! Tag matching policy.
//!
//! Document passages carry their level-2 problem tags as one free-text
//! field, so matching is substring containment, not token equality: a
//! passage matches a problem entry only if its tag field literally contains
//! every one of the entry's tags. Matching is case-sensitive.

/// True if `tag_field` contains every tag in `tags` as a substring.
pub fn matches_all_tags(tag_field: &str, tags: &[String]) -> bool {
    tags.iter().all(|tag| tag_field.contains(tag.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn single_tag_substring_match() {
        assert!(matches_all_tags(
            "Impact->Drivers, Conditions->Living",
            &tags(&["Impact->Drivers"])
        ));
        assert!(!matches_all_tags(
            "Impact->Drivers",
            &tags(&["Impact->Systems"])
        ));
    }

    #[test]
    fn all_tags_must_be_present() {
        let field = "Conditions->Living; Wash->Water";
        assert!(matches_all_tags(field, &tags(&["Conditions->Living", "Wash->Water"])));
        assert!(!matches_all_tags(field, &tags(&["Conditions->Living", "Health->Care"])));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!matches_all_tags("impact->drivers", &tags(&["Impact->Drivers"])));
    }

    #[test]
    fn substring_not_token_equality() {
        // A tag embedded in a longer token still matches
        assert!(matches_all_tags(
            "Prefix Impact->Drivers Suffix",
            &tags(&["Impact->Drivers"])
        ));
    }

    #[test]
    fn empty_tag_list_matches_everything() {
        assert!(matches_all_tags("anything", &tags(&[])));
        assert!(matches_all_tags("", &tags(&[])));
    }
}
