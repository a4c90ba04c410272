//! Flat key/value view of the host's XML responses
//!
//! The host answers every request with a single root element whose
//! attributes carry `status_code`/`status_message` and whose children are
//! plain `<name>value</name>` pairs. Nesting is flattened: every element's
//! attributes and every leaf element's text land in one ordered map.

mod decode;
mod encode;

pub use decode::{XmlDecodeError, decode_strict};
pub use encode::encode_response;

/// Ordered key→value map decoded from a response body
///
/// A missing key means the host did not send the element, which is distinct
/// from an element that was sent empty (`Some("")`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(String, String)>,
}

impl Fields {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value; a replaced key keeps its position
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Look up a value by exact key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Check whether the host sent the key at all
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// Decode a response body, never failing
///
/// Blank or malformed bodies yield an empty map; callers treat missing
/// fields as a protocol error at the point they need them.
#[must_use]
pub fn decode_fields(body: &str) -> Fields {
    if body.trim().is_empty() {
        return Fields::new();
    }

    match decode_strict(body) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::debug!("Discarding malformed response body: {}", e);
            Fields::new()
        }
    }
}

#[cfg(test)]
mod tests;
