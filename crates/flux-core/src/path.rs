//! Staging/final path construction, ported from the original
//! `PathHelper`.

const STAGING_SEGMENT: &str = "_tmp";

/// Substitutes the single `{entity}` placeholder in `pattern`.
pub fn substitute_entity(pattern: &str, entity: &str) -> String {
    pattern.replace("{entity}", entity)
}

/// Inserts a `_tmp` segment immediately before the entity segment of a
/// final path. If the entity segment is first, staging is
/// `_tmp/{entity}/...`; if there is no entity segment, staging is
/// `{parent}/_tmp/...`.
pub fn build_staging_path(final_path: &str, entity: Option<&str>) -> String {
    let Some(entity) = entity else {
        return join(&[trim_trailing_slash(final_path), STAGING_SEGMENT]);
    };

    let segments: Vec<&str> = final_path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.iter().position(|s| *s == entity) {
        Some(0) => join(&[STAGING_SEGMENT, entity]) + "/" + &segments[1..].join("/"),
        Some(idx) => {
            let before = segments[..idx].join("/");
            let after = segments[idx..].join("/");
            format!("{before}/{STAGING_SEGMENT}/{after}")
        }
        None => join(&[trim_trailing_slash(final_path), STAGING_SEGMENT]),
    }
}

pub fn build_final_path(pattern: &str, entity: Option<&str>) -> String {
    match entity {
        Some(e) => substitute_entity(pattern, e),
        None => pattern.to_string(),
    }
}

/// Joins path segments with a single `/`, collapsing empty segments.
pub fn join(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn merge_paths(parent: &str, child: &str) -> String {
    join(&[parent, child])
}

fn trim_trailing_slash(path: &str) -> &str {
    path.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_tmp_before_entity_segment() {
        assert_eq!(build_staging_path("Files/customers/", Some("customers")), "Files/_tmp/customers");
    }

    #[test]
    fn entity_first_gets_tmp_prefixed() {
        assert_eq!(build_staging_path("customers/2026", Some("customers")), "_tmp/customers/2026");
    }

    #[test]
    fn no_entity_appends_tmp_to_parent() {
        assert_eq!(build_staging_path("Files/orders", None), "Files/orders/_tmp");
    }

    #[test]
    fn substitutes_single_entity_placeholder() {
        assert_eq!(substitute_entity("Files/{entity}/data", "customers"), "Files/customers/data");
    }
}
