//! Data structures for the fingerprint store payload.
//!
//! The payload is a Wappalyzer-shaped JSON document: a `technologies` map
//! (name -> rule) and a `categories` map (id -> display info). The rule
//! fields tolerate both string and array-of-strings forms, since community
//! rulesets use both interchangeably.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Declarative matching signature for one technology.
///
/// The technology name is the key in the payload's `technologies` map, not a
/// field. All patterns are regex source strings at this stage; compilation
/// (and skipping of uncompilable patterns) happens in the store loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FingerprintRule {
    /// Category IDs, priority-ordered; the first is the primary category.
    #[serde(default)]
    pub cats: Vec<u32>,
    /// Header patterns: header name -> pattern (empty = presence-only)
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Cookie patterns: cookie name -> pattern (empty = presence-only)
    #[serde(default)]
    pub cookies: HashMap<String, String>,
    /// Meta tag patterns: meta name -> pattern(s); values may be a string or
    /// an array of strings in the payload
    #[serde(default)]
    #[serde(deserialize_with = "string_or_array_map")]
    pub meta: HashMap<String, Vec<String>>,
    /// Script URL patterns (string or array); Wappalyzer uses "scriptSrc"
    #[serde(default)]
    #[serde(alias = "scriptSrc")]
    #[serde(deserialize_with = "string_or_array")]
    pub script: Vec<String>,
    /// HTML text patterns (string or array)
    #[serde(default)]
    #[serde(deserialize_with = "string_or_array")]
    pub html: Vec<String>,
    /// Names of technologies whose presence this one entails
    #[serde(default)]
    #[serde(deserialize_with = "string_or_array")]
    pub implies: Vec<String>,
}

/// Deserializes a field that can be either a string or an array of strings.
fn string_or_array<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct StringOrArrayVisitor;

    impl<'de> Visitor<'de> for StringOrArrayVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or an array of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value])
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(elem) = seq.next_element::<String>()? {
                vec.push(elem);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrArrayVisitor)
}

/// Deserializes a map whose values can be either strings or string arrays.
fn string_or_array_map<'de, D>(deserializer: D) -> Result<HashMap<String, Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, MapAccess, Visitor};
    use std::fmt;

    struct PatternMapVisitor;

    impl<'de> Visitor<'de> for PatternMapVisitor {
        type Value = HashMap<String, Vec<String>>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of string to string or array of strings")
        }

        fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
        where
            M: MapAccess<'de>,
        {
            let mut result = HashMap::new();
            while let Some((key, value)) = map.next_entry::<String, serde_json::Value>()? {
                let patterns = match value {
                    serde_json::Value::String(s) => vec![s],
                    serde_json::Value::Array(arr) => arr
                        .into_iter()
                        .filter_map(|v| v.as_str().map(|s| s.to_string()))
                        .collect(),
                    _ => {
                        return Err(de::Error::invalid_type(
                            de::Unexpected::Other("expected string or array"),
                            &self,
                        ));
                    }
                };
                result.insert(key, patterns);
            }
            Ok(result)
        }
    }

    deserializer.deserialize_map(PatternMapVisitor)
}

/// Category entry in the payload's `categories` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    #[serde(default)]
    pub priority: u32,
}
