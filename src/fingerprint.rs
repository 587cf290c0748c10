//! Deterministic digests over a target's resolved image-id mapping.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

/// Hex SHA-256 digest over a target's image → id mapping.
///
/// Keys are sorted before hashing so the digest is independent of map
/// iteration order, and both keys and values are length-prefixed so adjacent
/// entries cannot alias. An unresolved image is expected to be present with
/// an empty id; the length prefix keeps that distinct from any real id.
pub fn fingerprint(images: &HashMap<String, String>) -> String {
    let mut entries: Vec<(&String, &String)> = images.iter().collect();
    entries.sort_by_key(|(image, _)| *image);

    let mut hasher = Sha256::new();
    for (image, id) in entries {
        hasher.update((image.len() as u64).to_le_bytes());
        hasher.update(image.as_bytes());
        hasher.update((id.len() as u64).to_le_bytes());
        hasher.update(id.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = map(&[("docker.io/library/alpine:latest", "sha256:aaa"), ("docker.io/myorg/app:1.0", "sha256:bbb")]);
        let b = map(&[("docker.io/myorg/app:1.0", "sha256:bbb"), ("docker.io/library/alpine:latest", "sha256:aaa")]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn changing_an_id_changes_the_digest() {
        let before = map(&[("docker.io/library/alpine:latest", "sha256:aaa")]);
        let after = map(&[("docker.io/library/alpine:latest", "sha256:ccc")]);
        assert_ne!(fingerprint(&before), fingerprint(&after));
    }

    #[test]
    fn missing_id_differs_from_any_real_id() {
        let unresolved = map(&[("docker.io/library/alpine:latest", "")]);
        let resolved = map(&[("docker.io/library/alpine:latest", "sha256:aaa")]);
        assert_ne!(fingerprint(&unresolved), fingerprint(&resolved));
    }

    #[test]
    fn entries_do_not_alias_across_boundaries() {
        // Same concatenated bytes, different key/value split.
        let a = map(&[("ab", "c")]);
        let b = map(&[("a", "bc")]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn stable_across_calls() {
        let m = map(&[("docker.io/library/alpine:latest", "sha256:aaa")]);
        assert_eq!(fingerprint(&m), fingerprint(&m));
    }
}
