//! Cache key derivation for targeting requests.

use std::fmt;

use url::form_urlencoded::byte_serialize;

use reach_core::constants::{CACHE_KEY_DELIMITER, CACHE_KEY_NAMESPACE};
use reach_core::types::TargetingRequest;

fn encode(part: &str) -> String {
    byte_serialize(part.as_bytes()).collect()
}

/// Canonical cache key of a targeting request.
///
/// Shape: `delivery:<name>:<value>:...:page<N>:limit<M>`, dimensions sorted
/// by name. Names and values are form-urlencoded so they never contain the
/// delimiter; two requests share a key iff they carry the same dimension
/// values, page, and limit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a request.
    pub fn for_request(request: &TargetingRequest) -> Self {
        let page = request.page();
        let mut parts = Vec::with_capacity(request.len() * 2 + 3);
        parts.push(CACHE_KEY_NAMESPACE.to_string());
        for (name, value) in request.dimensions() {
            parts.push(encode(name));
            parts.push(encode(value));
        }
        parts.push(format!("page{}", page.page()));
        parts.push(format!("limit{}", page.limit()));
        Self(parts.join(CACHE_KEY_DELIMITER))
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use reach_core::types::Page;

    fn request(pairs: &[(&str, &str)], page: Page) -> TargetingRequest {
        let mut req = TargetingRequest::new(page);
        for (k, v) in pairs {
            req.insert(k, v);
        }
        req
    }

    #[test]
    fn test_key_format() {
        let key = CacheKey::for_request(&request(
            &[("os", "android"), ("app_id", "com.game"), ("country", "US")],
            Page::default(),
        ));
        assert_eq!(
            key.as_str(),
            "delivery:app_id:com.game:country:US:os:android:page1:limit10"
        );
    }

    #[test]
    fn test_order_independent() {
        let a = request(&[("app_id", "a"), ("country", "b"), ("os", "c")], Page::default());
        let b = request(&[("country", "b"), ("app_id", "a"), ("os", "c")], Page::default());
        assert_eq!(CacheKey::for_request(&a), CacheKey::for_request(&b));
    }

    #[test]
    fn test_page_and_limit_distinguish() {
        let pairs = [("app_id", "a"), ("country", "b"), ("os", "c")];
        let first = CacheKey::for_request(&request(&pairs, Page::new(1, 10).unwrap()));
        let second = CacheKey::for_request(&request(&pairs, Page::new(2, 10).unwrap()));
        let wider = CacheKey::for_request(&request(&pairs, Page::new(1, 20).unwrap()));
        assert_ne!(first, second);
        assert_ne!(first, wider);
    }

    #[test]
    fn test_delimiter_in_value_cannot_collide() {
        let a = request(&[("x", "1:y:2")], Page::default());
        let b = request(&[("x", "1"), ("y", "2")], Page::default());
        assert_ne!(CacheKey::for_request(&a), CacheKey::for_request(&b));
        assert!(CacheKey::for_request(&a).as_str().contains("1%3Ay%3A2"));
    }

    #[test]
    fn test_values_are_case_sensitive() {
        let upper = request(&[("country", "US")], Page::default());
        let lower = request(&[("country", "us")], Page::default());
        assert_ne!(CacheKey::for_request(&upper), CacheKey::for_request(&lower));
    }

    proptest! {
        #[test]
        fn prop_key_ignores_insertion_order(
            pairs in proptest::collection::btree_map("[a-z_]{1,8}", "[A-Za-z0-9:. ]{1,8}", 0..6)
                .prop_map(|m| m.into_iter().collect::<Vec<_>>())
                .prop_shuffle()
        ) {
            let sorted = {
                let mut p = pairs.clone();
                p.sort();
                p
            };
            let build = |ps: &[(String, String)]| {
                let mut req = TargetingRequest::new(Page::default());
                for (k, v) in ps {
                    req.insert(k, v);
                }
                CacheKey::for_request(&req)
            };
            prop_assert_eq!(build(&pairs), build(&sorted));
        }
    }
}
