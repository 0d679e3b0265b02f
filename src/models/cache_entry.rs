use bytes::Bytes;
use std::fmt;

use crate::utils::content_fingerprint;

/// Canonical fingerprint of a [`RenderRequest`](super::RenderRequest)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// A rendered image as stored in the render cache
///
/// Entries are immutable; replacing one means inserting a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    payload: Bytes,
    content_type: String,
    fingerprint: String,
    size_bytes: usize,
}

impl CacheEntry {
    pub fn new<P: Into<Bytes>, C: Into<String>>(payload: P, content_type: C) -> Self {
        let payload = payload.into();
        Self {
            fingerprint: content_fingerprint(&payload),
            size_bytes: payload.len(),
            content_type: content_type.into(),
            payload,
        }
    }

    /// Cheap clone of the payload (reference counted)
    pub fn payload(&self) -> Bytes {
        self.payload.clone()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Quoted strong entity tag
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.fingerprint)
    }

    /// Whether an `If-None-Match` header value matches this entry
    ///
    /// Accepts `*`, a single tag or a comma separated list; weak validators
    /// (`W/"..."`) compare by their opaque tag.
    pub fn matches_if_none_match(&self, header_value: &str) -> bool {
        header_value.split(',').map(str::trim).any(|candidate| {
            if candidate == "*" {
                return true;
            }
            let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
            candidate.trim_matches('"') == self.fingerprint
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_metadata() {
        let entry = CacheEntry::new(&b"<svg/>"[..], "image/svg+xml");
        assert_eq!(entry.size_bytes(), 6);
        assert_eq!(entry.content_type(), "image/svg+xml");
        assert_eq!(entry.etag(), format!("\"{}\"", entry.fingerprint()));
        assert_eq!(entry.payload(), Bytes::from_static(b"<svg/>"));
    }

    #[test]
    fn test_if_none_match() {
        let entry = CacheEntry::new(&b"payload"[..], "image/png");
        let etag = entry.etag();
        assert!(entry.matches_if_none_match(&etag));
        assert!(entry.matches_if_none_match("*"));
        assert!(entry.matches_if_none_match(&format!("\"other\", {etag}")));
        assert!(entry.matches_if_none_match(&format!("W/{etag}")));
        assert!(!entry.matches_if_none_match("\"other\""));
        assert!(!entry.matches_if_none_match(""));
    }
}
