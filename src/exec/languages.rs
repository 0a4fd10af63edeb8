/// Judge language identifiers for the tags the hub accepts. Anything else is
/// rejected before a submission is attempted.
pub fn language_id(tag: &str) -> Option<u32> {
    match tag {
        "javascript" => Some(63),
        "python" => Some(71),
        "java" => Some(62),
        "c" => Some(50),
        "cpp" => Some(54),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_map_to_judge_ids() {
        assert_eq!(language_id("javascript"), Some(63));
        assert_eq!(language_id("python"), Some(71));
        assert_eq!(language_id("java"), Some(62));
        assert_eq!(language_id("c"), Some(50));
        assert_eq!(language_id("cpp"), Some(54));
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert_eq!(language_id("ruby"), None);
        assert_eq!(language_id("Python"), None);
        assert_eq!(language_id(""), None);
    }
}
