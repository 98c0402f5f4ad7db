//! Ancestry path encoding, normalization, and matching.
//!
//! The canonical ancestry path is a `/`-joined sequence of `kind/id`
//! pairs ordered root-first, with kinds in singular form:
//! `organization/1/folder/2/project/3`. Both legal source forms (the
//! structured ancestor list and an already-encoded path string) collapse
//! to this encoding.

/// Encode an ordered ancestor list (root-first, `kind/id` entries) into
/// the canonical ancestry path.
pub fn ancestry_path(ancestors: &[String]) -> String {
    normalize_ancestry(&ancestors.join("/"))
}

/// Re-encode an ancestry path into canonical form. Idempotent.
pub fn normalize_ancestry(path: &str) -> String {
    path.split('/')
        .filter(|seg| !seg.is_empty())
        .enumerate()
        .map(|(i, seg)| if i % 2 == 0 { normalize_kind(seg) } else { seg })
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize_kind(kind: &str) -> &str {
    match kind {
        "organizations" | "organization" | "org" => "organization",
        "folders" | "folder" => "folder",
        "projects" | "project" => "project",
        other => other,
    }
}

/// Glob match over path segments: `*` matches exactly one segment, `**`
/// matches any (possibly empty) suffix from its position.
pub fn matches_pattern(pattern: &str, path: &str) -> bool {
    matches_with_separator(pattern, path, '/')
}

/// Same glob semantics over `.`-separated Terraform resource addresses.
pub fn matches_address(pattern: &str, address: &str) -> bool {
    matches_with_separator(pattern, address, '.')
}

fn matches_with_separator(pattern: &str, path: &str, sep: char) -> bool {
    let pat: Vec<&str> = pattern.split(sep).filter(|s| !s.is_empty()).collect();
    let segs: Vec<&str> = path.split(sep).filter(|s| !s.is_empty()).collect();
    matches_segments(&pat, &segs)
}

fn matches_segments(pat: &[&str], segs: &[&str]) -> bool {
    match pat.split_first() {
        None => segs.is_empty(),
        Some((&"**", rest)) => (0..=segs.len()).any(|i| matches_segments(rest, &segs[i..])),
        Some((p, rest)) => match segs.split_first() {
            Some((s, srest)) => (*p == "*" || p == s) && matches_segments(rest, srest),
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestry_path_normalizes_kinds() {
        let ancestors = vec!["org/1".to_string(), "folder/2".to_string()];
        assert_eq!(ancestry_path(&ancestors), "organization/1/folder/2");
    }

    #[test]
    fn test_ancestry_path_plural_kinds() {
        let ancestors = vec![
            "organizations/56789".to_string(),
            "folders/123".to_string(),
            "projects/abc".to_string(),
        ];
        assert_eq!(
            ancestry_path(&ancestors),
            "organization/56789/folder/123/project/abc"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_ancestry("organizations/1/folders/2/projects/3");
        let twice = normalize_ancestry(&once);
        assert_eq!(once, "organization/1/folder/2/project/3");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_keeps_unknown_kinds() {
        assert_eq!(
            normalize_ancestry("organization/1/team/42"),
            "organization/1/team/42"
        );
    }

    #[test]
    fn test_normalize_drops_empty_segments() {
        assert_eq!(normalize_ancestry("/organization/1/"), "organization/1");
    }

    #[test]
    fn test_pattern_double_star_matches_suffix() {
        assert!(matches_pattern("organization/1/**", "organization/1"));
        assert!(matches_pattern(
            "organization/1/**",
            "organization/1/folder/2/project/3"
        ));
        assert!(!matches_pattern("organization/1/**", "organization/2"));
    }

    #[test]
    fn test_pattern_single_star_matches_one_segment() {
        assert!(matches_pattern("organization/*", "organization/9"));
        assert!(!matches_pattern("organization/*", "organization/9/folder/2"));
        assert!(matches_pattern(
            "organization/*/folder/2",
            "organization/1/folder/2"
        ));
    }

    #[test]
    fn test_address_glob_uses_dot_segments() {
        assert!(matches_address(
            "google_storage_bucket.*",
            "google_storage_bucket.logs"
        ));
        assert!(matches_address("module.**", "module.network.google_compute_network.vpc"));
        assert!(!matches_address(
            "google_storage_bucket.*",
            "google_compute_instance.vm"
        ));
    }

    #[test]
    fn test_pattern_exact_match() {
        assert!(matches_pattern("organization/1", "organization/1"));
        assert!(!matches_pattern("organization/1", "organization/1/folder/2"));
    }
}
