//! # Composite Keys
//!
//! Encodes an object type plus an ordered list of attributes into a single
//! world-state key:
//!
//! ```text
//! \0 <object_type> \0 <attr_1> \0 <attr_2> \0 ... <attr_n> \0
//! ```
//!
//! Every component is terminated by the delimiter, and components may not
//! contain it, so the mapping from component lists to keys is injective.
//! Because the object type comes first, all keys of one type share the
//! prefix `\0<object_type>\0`. Fixing leading attributes narrows the
//! prefix further (`\0Asset\0gem\0` covers every gem record).

use crate::config::{COMPOSITE_KEY_DELIMITER, MAX_UNICODE_RUNE};

/// Errors raised while building or splitting a composite key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("composite key component must not be empty")]
    EmptyComponent,

    #[error("composite key component {0:?} contains a reserved character")]
    ReservedCharacter(String),

    #[error("not a composite key: {0:?}")]
    Malformed(String),
}

pub type KeyResult<T> = Result<T, KeyError>;

fn validate_component(component: &str) -> KeyResult<()> {
    if component.is_empty() {
        return Err(KeyError::EmptyComponent);
    }
    if component.contains(COMPOSITE_KEY_DELIMITER) || component.contains(MAX_UNICODE_RUNE) {
        return Err(KeyError::ReservedCharacter(component.to_string()));
    }
    Ok(())
}

/// Build the full composite key for `object_type` and `attributes`.
pub fn create_composite_key(object_type: &str, attributes: &[&str]) -> KeyResult<String> {
    validate_component(object_type)?;
    let capacity = 2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>();
    let mut key = String::with_capacity(capacity);
    key.push(COMPOSITE_KEY_DELIMITER);
    key.push_str(object_type);
    key.push(COMPOSITE_KEY_DELIMITER);
    for attr in attributes {
        validate_component(attr)?;
        key.push_str(attr);
        key.push(COMPOSITE_KEY_DELIMITER);
    }
    Ok(key)
}

/// Prefix covering every key of `object_type` whose leading attributes
/// equal `attributes`. An empty slice covers the whole object type.
///
/// This is the same string `create_composite_key` produces; the name exists
/// to make range-scan call sites read correctly.
pub fn partial_key_prefix(object_type: &str, attributes: &[&str]) -> KeyResult<String> {
    create_composite_key(object_type, attributes)
}

/// Split a composite key back into its object type and attributes.
pub fn split_composite_key(key: &str) -> KeyResult<(String, Vec<String>)> {
    let body = key
        .strip_prefix(COMPOSITE_KEY_DELIMITER)
        .and_then(|rest| rest.strip_suffix(COMPOSITE_KEY_DELIMITER))
        .ok_or_else(|| KeyError::Malformed(key.to_string()))?;

    let mut parts = body.split(COMPOSITE_KEY_DELIMITER);
    let object_type = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| KeyError::Malformed(key.to_string()))?
        .to_string();

    let attributes: Vec<String> = parts.map(str::to_string).collect();
    if attributes.iter().any(String::is_empty) {
        return Err(KeyError::Malformed(key.to_string()));
    }
    Ok((object_type, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic() {
        let a = create_composite_key("Asset", &["gem", "alice"]).unwrap();
        let b = create_composite_key("Asset", &["gem", "alice"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "\u{0}Asset\u{0}gem\u{0}alice\u{0}");
    }

    #[test]
    fn shifted_boundaries_do_not_collide() {
        let a = create_composite_key("Asset", &["ab", "c"]).unwrap();
        let b = create_composite_key("Asset", &["a", "bc"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn kind_and_owner_are_not_interchangeable() {
        let a = create_composite_key("Asset", &["gem", "exp"]).unwrap();
        let b = create_composite_key("Asset", &["exp", "gem"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn reserved_characters_are_rejected() {
        assert_eq!(
            create_composite_key("Asset", &["gem\u{0}x", "alice"]),
            Err(KeyError::ReservedCharacter("gem\u{0}x".into()))
        );
        assert!(create_composite_key("Asset", &["gem", "bob\u{10FFFF}"]).is_err());
        assert!(create_composite_key("As\u{0}set", &[]).is_err());
    }

    #[test]
    fn empty_components_are_rejected() {
        assert_eq!(
            create_composite_key("Asset", &["gem", ""]),
            Err(KeyError::EmptyComponent)
        );
        assert_eq!(create_composite_key("", &["gem"]), Err(KeyError::EmptyComponent));
    }

    #[test]
    fn full_keys_fall_under_their_partial_prefixes() {
        let key = create_composite_key("Asset", &["gem", "alice"]).unwrap();
        let namespace = partial_key_prefix("Asset", &[]).unwrap();
        let by_kind = partial_key_prefix("Asset", &["gem"]).unwrap();
        assert!(key.starts_with(&namespace));
        assert!(key.starts_with(&by_kind));

        // "gemstone" must not leak into the "gem" range.
        let other = create_composite_key("Asset", &["gemstone", "alice"]).unwrap();
        assert!(!other.starts_with(&by_kind));
    }

    #[test]
    fn split_inverts_create() {
        let key = create_composite_key("Asset", &["exp", "Team 1 / ñ"]).unwrap();
        let (object_type, attrs) = split_composite_key(&key).unwrap();
        assert_eq!(object_type, "Asset");
        assert_eq!(attrs, vec!["exp".to_string(), "Team 1 / ñ".to_string()]);
    }

    #[test]
    fn split_rejects_plain_keys() {
        assert!(split_composite_key("gem").is_err());
        assert!(split_composite_key("\u{0}\u{0}").is_err());
        assert!(split_composite_key("\u{0}Asset\u{0}gem\u{0}\u{0}").is_err());
    }
}
