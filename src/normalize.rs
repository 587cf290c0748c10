//! Canonicalization of container image references.
//!
//! Every reference is compared and used as a map key in its fully qualified
//! `registry/repository:tag` form, so all call sites must go through
//! [`normalize`] or equal images would be treated as distinct.

/// Expand a user-supplied image reference into `registry/repository:tag`.
///
/// Bare names get the `library/` namespace, references without a registry
/// host get `docker.io/`, and a missing tag defaults to `latest`. Pure
/// string transform; idempotent.
pub fn normalize(image: &str) -> String {
    let mut image = image.to_string();

    match image.matches('/').count() {
        0 => image = format!("docker.io/library/{image}"),
        1 => image = format!("docker.io/{image}"),
        _ => {}
    }

    let last_segment = image.rsplit('/').next().unwrap_or(&image);
    if !last_segment.contains(':') {
        image.push_str(":latest");
    }

    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_gets_library_namespace_and_registry() {
        assert_eq!(normalize("alpine"), "docker.io/library/alpine:latest");
    }

    #[test]
    fn namespaced_name_gets_registry() {
        assert_eq!(normalize("myorg/app:1.0"), "docker.io/myorg/app:1.0");
    }

    #[test]
    fn custom_registry_is_kept() {
        assert_eq!(
            normalize("myregistry.example/myorg/app"),
            "myregistry.example/myorg/app:latest"
        );
    }

    #[test]
    fn tag_is_not_duplicated() {
        assert_eq!(normalize("alpine:3.20"), "docker.io/library/alpine:3.20");
    }

    #[test]
    fn registry_port_does_not_count_as_tag() {
        // The colon lives in the host segment, not the last path segment.
        assert_eq!(
            normalize("localhost:5000/myorg/app"),
            "localhost:5000/myorg/app:latest"
        );
    }

    #[test]
    fn idempotent() {
        for raw in [
            "alpine",
            "myorg/app:1.0",
            "myregistry.example/myorg/app",
            "docker.io/library/alpine:latest",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }
}
