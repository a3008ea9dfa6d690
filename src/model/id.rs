//! Path identifiers.
//!
//! A node id is a '/'-delimited path: `ns/G1/G2`. The first segment names the
//! namespace, the last one is the node name, and everything but the last
//! segment is the id of the containing node.
//!
//! Malformed ids (empty, or with empty segments) are a caller contract
//! violation for the pure helpers; use [`validate_id`] at the boundary.

use once_cell::sync::Lazy;
use regex::Regex;

pub const SEPARATOR: char = '/';

/// Names and label names share this shape.
pub const NAME_PATTERN: &str = r"^[a-zA-Z_][0-9a-zA-Z_]*$";

pub const NAME_HINT: &str = "Must start with a letter ('a'..'z'|'A'..'Z') or underscore '_' followed by any number of letters, underscores and numbers ('0'..'9').";

pub const ID_HINT: &str =
    "Each node must have a unique id field being the path to the node, e.g. \"nsp/G1/G12\"";

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(NAME_PATTERN).expect("valid name regex"));

/// Id of the containing node; empty for a single-segment id.
pub fn parent_id(id: &str) -> &str {
    match id.rfind(SEPARATOR) {
        Some(pos) => &id[..pos],
        None => "",
    }
}

/// Last path segment.
pub fn name_of(id: &str) -> &str {
    match id.rfind(SEPARATOR) {
        Some(pos) => &id[pos + 1..],
        None => id,
    }
}

/// First path segment.
pub fn namespace_of(id: &str) -> &str {
    match id.find(SEPARATOR) {
        Some(pos) => &id[..pos],
        None => id,
    }
}

/// True iff `child_id` is owned by `owner_id` (exactly one segment deeper).
pub fn is_containment(owner_id: &str, child_id: &str) -> bool {
    parent_id(child_id) == owner_id
}

/// True iff the edge `owner_id -> child_id` points at a node owned elsewhere.
pub fn is_reference(owner_id: &str, child_id: &str) -> bool {
    !is_containment(owner_id, child_id)
}

/// True iff `id` is `ancestor_id` or lies underneath it.
pub fn is_self_or_descendant(id: &str, ancestor_id: &str) -> bool {
    id == ancestor_id
        || (id.len() > ancestor_id.len()
            && id.starts_with(ancestor_id)
            && id[ancestor_id.len()..].starts_with(SEPARATOR))
}

/// Id the node would get if renamed to `new_name`.
pub fn renamed_id(id: &str, new_name: &str) -> String {
    child_id(parent_id(id), new_name)
}

/// Join an owner id and a child name.
pub fn child_id(owner_id: &str, name: &str) -> String {
    if owner_id.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", owner_id, SEPARATOR, name)
    }
}

/// Number of path segments.
pub fn depth(id: &str) -> usize {
    id.split(SEPARATOR).count()
}

pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// Boundary check: at least `ns/name`, every segment a valid name.
pub fn validate_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("id cannot be empty".to_string());
    }
    let pieces: Vec<&str> = id.split(SEPARATOR).collect();
    if pieces.len() < 2 {
        return Err(format!("id \"{}\" has no namespace segment", id));
    }
    if let Some(bad) = pieces.iter().find(|p| !is_valid_name(p)) {
        return Err(format!("id \"{}\" has invalid segment \"{}\"", id, bad));
    }
    Ok(())
}

/// First `prefix{n}` (n = 1, 2, ...) not present in `existing`.
pub fn unique_child_name<S: AsRef<str>>(prefix: &str, existing: &[S]) -> String {
    let taken = |candidate: &str| existing.iter().any(|n| n.as_ref() == candidate);
    let mut cnt = 1usize;
    loop {
        let candidate = format!("{}{}", prefix, cnt);
        if !taken(&candidate) {
            return candidate;
        }
        cnt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parent_and_name_split_on_last_segment() {
        assert_eq!(parent_id("m/G1/G2"), "m/G1");
        assert_eq!(parent_id("m"), "");
        assert_eq!(name_of("m/G1/G2"), "G2");
        assert_eq!(namespace_of("m/G1/G2"), "m");
    }

    #[test]
    fn containment_is_exactly_one_segment_deeper() {
        assert!(is_containment("m/G1", "m/G1/G2"));
        assert!(!is_containment("m/G1", "m/G1/G2/G3"));
        assert!(!is_containment("m/G1", "m/G12"));
        assert!(is_reference("m/G3", "m/G1/G2"));
    }

    #[test]
    fn every_id_is_contained_by_its_parent_id() {
        for id in ["m/G1", "m/G1/G2", "a/b/c/d"] {
            assert!(is_containment(parent_id(id), id));
        }
    }

    #[test]
    fn descendant_check_respects_segment_boundaries() {
        assert!(is_self_or_descendant("m/G1", "m/G1"));
        assert!(is_self_or_descendant("m/G1/G2", "m/G1"));
        assert!(!is_self_or_descendant("m/G10", "m/G1"));
    }

    #[test]
    fn renamed_id_keeps_parent() {
        assert_eq!(renamed_id("m/G1/G2", "Goal2"), "m/G1/Goal2");
        assert_eq!(renamed_id("m/G1", "Goal1"), "m/Goal1");
    }

    #[test]
    fn validate_id_reports_bad_segments() {
        assert!(validate_id("nsp/G1/G12").is_ok());
        assert!(validate_id("G1").is_err());
        assert!(validate_id("nsp/1G").is_err());
        assert!(validate_id("nsp//G1").is_err());
        assert!(validate_id("").is_err());
    }

    #[test]
    fn unique_child_name_skips_taken() {
        assert_eq!(unique_child_name("G", &["G1", "G2", "S1"]), "G3");
        assert_eq!(unique_child_name::<&str>("Sn", &[]), "Sn1");
    }
}
