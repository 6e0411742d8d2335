//! Cache key generation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::request::CompletionRequest;

/// Address of one cached response: the canonical request string and its digest.
///
/// Equality and hashing use the full canonical string; the digest only names
/// files in content-addressed stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub canonical: String,
    pub hash: String,
}

impl CacheKey {
    pub fn for_request(request: &CompletionRequest) -> Self {
        Self::from_canonical(request.canonical_string())
    }

    pub fn from_canonical(canonical: impl Into<String>) -> Self {
        let canonical = canonical.into();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Self { canonical, hash }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&CompletionRequest> for CacheKey {
    fn from(request: &CompletionRequest) -> Self {
        Self::for_request(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Options;
    use serde_json::json;

    fn request(pairs: &[(&str, serde_json::Value)]) -> CompletionRequest {
        let mut options = Options::new();
        for (k, v) in pairs {
            options.insert((*k).to_string(), v.clone());
        }
        CompletionRequest::from_options(options)
    }

    #[test]
    fn test_key_independent_of_construction_order() {
        let messages_a: serde_json::Value = serde_json::from_str(
            r#"[{"role":"user","content":[{"type":"text","text":"hi"},{"image_url":{"url":"https://x/y.png"},"type":"image_url"}]}]"#,
        )
        .unwrap();
        let messages_b: serde_json::Value = serde_json::from_str(
            r#"[{"content":[{"text":"hi","type":"text"},{"type":"image_url","image_url":{"url":"https://x/y.png"}}],"role":"user"}]"#,
        )
        .unwrap();

        let a = request(&[
            ("model", json!("gpt-4-vision-preview")),
            ("temperature", json!(0.0)),
            ("messages", messages_a),
        ]);
        let b = request(&[
            ("messages", messages_b),
            ("temperature", json!(0.0)),
            ("model", json!("gpt-4-vision-preview")),
        ]);

        assert_eq!(CacheKey::for_request(&a), CacheKey::for_request(&b));
    }

    #[test]
    fn test_different_content_different_key() {
        let a = request(&[("model", json!("m")), ("temperature", json!(0.0))]);
        let b = request(&[("model", json!("m")), ("temperature", json!(0.5))]);
        let ka = CacheKey::for_request(&a);
        let kb = CacheKey::for_request(&b);
        assert_ne!(ka, kb);
        assert_ne!(ka.hash, kb.hash);
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        let key = CacheKey::from_canonical("{}");
        assert_eq!(key.hash.len(), 64);
        assert!(key.hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key.to_string(), key.hash);
    }
}
