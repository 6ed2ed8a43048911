use sha2::{Digest, Sha256};
use uuid::Uuid;

const HASH_LEN: usize = 8;

/// `<prefix>-<8 hex>`, retried while `exists` reports a collision.
pub fn generate_item_id<F>(prefix: &str, mut exists: F) -> String
where
    F: FnMut(&str) -> bool,
{
    let prefix = normalize_prefix(prefix);

    for _ in 0..64 {
        let seed = Uuid::now_v7().to_string();
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        let candidate = format!("{}-{}", prefix, &digest[..HASH_LEN]);
        if !exists(&candidate) {
            return candidate;
        }
    }

    format!("{}-{}", prefix, Uuid::now_v7().simple())
}

pub fn normalize_prefix(raw: &str) -> String {
    let normalized = raw
        .trim()
        .trim_end_matches('-')
        .chars()
        .map(|ch| ch.to_ascii_lowercase())
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-')
        .collect::<String>();
    if normalized.is_empty() {
        "bd".to_string()
    } else {
        normalized
    }
}

/// Explicit ids must be non-empty and free of whitespace.
pub fn is_valid_item_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{generate_item_id, is_valid_item_id, normalize_prefix};

    #[test]
    fn generated_ids_have_prefix_and_short_hash() {
        let seen: HashSet<String> = HashSet::new();
        let id = generate_item_id("bd", |candidate| seen.contains(candidate));
        let (prefix, hash) = id.split_once('-').expect("id should contain a dash");
        assert_eq!(prefix, "bd");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn collisions_are_retried() {
        let mut calls = 0;
        let id = generate_item_id("bd", |_| {
            calls += 1;
            calls < 3
        });
        assert_eq!(calls, 3);
        assert!(id.starts_with("bd-"));
    }

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_prefix(" Web-"), "web");
        assert_eq!(normalize_prefix("!!"), "bd");
        assert!(is_valid_item_id("bd-1"));
        assert!(!is_valid_item_id("bd 1"));
        assert!(!is_valid_item_id(""));
    }
}
