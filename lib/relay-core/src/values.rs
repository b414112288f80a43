//! Multi-valued string maps for query strings and form bodies.

use std::collections::{BTreeMap, HashMap};

use crate::Result;

/// Ordered multi-map of string keys to string values.
///
/// Keys are kept sorted so the encoded form is stable; values keep their
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Values(BTreeMap<String, Vec<String>>);

impl Values {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to the key.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Replace all values of the key with a single value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), vec![value.into()]);
        self
    }

    /// First value of the key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    /// All values of the key, empty when absent.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Remove the key.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }

    /// Returns `true` if no key is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(key, value)` pairs, keys sorted.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key.as_str(), value.as_str())))
    }

    /// URL-encode as `k=v&k=v2&z=1`, keys sorted.
    #[must_use]
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }

    /// Build from a single-valued map.
    #[must_use]
    pub fn from_map<K, V>(map: &HashMap<K, V>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        map.iter()
            .map(|(key, value)| (key.as_ref(), value.as_ref()))
            .collect()
    }

    /// Build from a single-valued map, skipping empty values.
    #[must_use]
    pub fn from_map_omit_empty<K, V>(map: &HashMap<K, V>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        map.iter()
            .map(|(key, value)| (key.as_ref(), value.as_ref()))
            .filter(|(_, value)| !value.is_empty())
            .collect()
    }

    /// Build from any serializable struct.
    ///
    /// Uses `serde_html_form`, so `Vec<T>` fields become repeated keys and
    /// `None` fields are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as a flat form.
    ///
    /// # Example
    ///
    /// ```
    /// use relay_core::Values;
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct Search { q: String, tags: Vec<String> }
    ///
    /// let search = Search { q: "rust".to_string(), tags: vec!["a".into(), "b".into()] };
    /// let values = Values::from_serialize(&search).expect("serialize");
    /// assert_eq!(values.encode(), "q=rust&tags=a&tags=b");
    /// ```
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Result<Self> {
        let encoded = serde_html_form::to_string(value).map_err(crate::ErrorKind::from)?;
        Ok(url::form_urlencoded::parse(encoded.as_bytes()).collect())
    }

    /// Merge every pair of `other` into `self`.
    pub fn extend_from(&mut self, other: &Self) {
        for (key, value) in other.iter() {
            self.add(key, value);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Values
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = Self::new();
        for (key, value) in iter {
            values.add(key, value);
        }
        values
    }
}

impl<K, V> Extend<(K, V)> for Values
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_sorted_by_key() {
        let values: Values = [("b", "2"), ("a", "1"), ("a", "0")].into_iter().collect();
        assert_eq!(values.encode(), "a=1&a=0&b=2");
    }

    #[test]
    fn encode_escapes() {
        let mut values = Values::new();
        values.add("q", "rust lang").add("x", "a&b=c");
        assert_eq!(values.encode(), "q=rust+lang&x=a%26b%3Dc");
    }

    #[test]
    fn get_and_set() {
        let mut values = Values::new();
        values.add("a", "1").add("a", "2");
        assert_eq!(values.get("a"), Some("1"));
        assert_eq!(values.get_all("a"), ["1", "2"]);
        values.set("a", "3");
        assert_eq!(values.get_all("a"), ["3"]);
        assert_eq!(values.get("missing"), None);
        assert!(values.get_all("missing").is_empty());
    }

    #[test]
    fn from_map_omit_empty() {
        let map = HashMap::from([("name", "n"), ("empty", "")]);
        assert_eq!(Values::from_map(&map).encode(), "empty=&name=n");
        assert_eq!(Values::from_map_omit_empty(&map).encode(), "name=n");
    }

    #[test]
    fn from_serialize_skips_none() {
        #[derive(serde::Serialize)]
        struct Search {
            q: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            page: Option<u32>,
        }

        let values = Values::from_serialize(&Search {
            q: "rust".to_string(),
            page: None,
        })
        .expect("serialize");
        assert_eq!(values.encode(), "q=rust");

        let values = Values::from_serialize(&Search {
            q: "rust".to_string(),
            page: Some(2),
        })
        .expect("serialize");
        assert_eq!(values.get("page"), Some("2"));
    }

    #[test]
    fn from_serialize_rejects_nested() {
        #[derive(serde::Serialize)]
        struct Inner {
            a: u32,
        }
        #[derive(serde::Serialize)]
        struct Outer {
            inner: Inner,
        }

        let result = Values::from_serialize(&Outer {
            inner: Inner { a: 1 },
        });
        assert!(result.is_err());
    }
}
