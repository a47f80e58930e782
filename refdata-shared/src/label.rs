//! Multilingual labels.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Language tag of the synthetic "undetermined" label.
pub const UNDETERMINED: &str = "und";

/// Language tag -> label text.
///
/// Ordered so that serialized documents are stable between pipeline runs.
/// Every normalized entry carries an [`UNDETERMINED`] label, see
/// [`LabelMap::with_undetermined`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap(BTreeMap<String, String>);

impl LabelMap {
    /// Create an empty label map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a label, ignoring empty text.
    pub fn insert(&mut self, lang: impl Into<String>, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.0.insert(lang.into(), text);
    }

    /// Builder-style variant of [`LabelMap::insert`].
    pub fn with(mut self, lang: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(lang, text);
        self
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0.get(lang).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Compute the undetermined label value.
    ///
    /// Precedence: `fi`, then `en`, then a source-supplied `und`, then the
    /// first remaining value in tag order, then `code` when the map is empty.
    pub fn undetermined_value(&self, code: &str) -> String {
        self.0
            .get("fi")
            .or_else(|| self.0.get("en"))
            .or_else(|| self.0.get(UNDETERMINED))
            .or_else(|| self.0.values().next())
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }

    /// Return the map with the [`UNDETERMINED`] label set.
    pub fn with_undetermined(mut self, code: &str) -> Self {
        let und = self.undetermined_value(code);
        self.0.insert(UNDETERMINED.to_string(), und);
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut labels = LabelMap::new();
        for (lang, text) in iter {
            labels.insert(lang, text);
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_und_prefers_finnish() {
        let labels = LabelMap::new()
            .with("en", "English")
            .with("fi", "Suomi")
            .with("sv", "Svenska")
            .with_undetermined("code");

        assert_eq!(labels.get(UNDETERMINED), Some("Suomi"));
    }

    #[test]
    fn test_und_falls_back_to_english() {
        let labels = LabelMap::new()
            .with("sv", "Svenska")
            .with("en", "English")
            .with_undetermined("code");

        assert_eq!(labels.get(UNDETERMINED), Some("English"));
    }

    #[test]
    fn test_und_falls_back_to_present_value() {
        let labels = LabelMap::new().with("sv", "Svenska").with_undetermined("code");

        assert_eq!(labels.get(UNDETERMINED), Some("Svenska"));
    }

    #[test]
    fn test_und_falls_back_to_code() {
        let labels = LabelMap::new().with_undetermined("vnd.example");

        assert_eq!(labels.get(UNDETERMINED), Some("vnd.example"));
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn test_source_und_kept_without_fi_or_en() {
        let labels = LabelMap::new()
            .with("und", "Given")
            .with("de", "Deutsch")
            .with_undetermined("code");

        assert_eq!(labels.get(UNDETERMINED), Some("Given"));
    }

    #[test]
    fn test_und_is_always_an_existing_value() {
        let samples = vec![
            vec![("fi", "a"), ("en", "b")],
            vec![("en", "b"), ("sv", "c")],
            vec![("sv", "c"), ("de", "d")],
            vec![("zh", "e")],
        ];

        for sample in samples {
            let labels: LabelMap = sample.clone().into_iter().collect();
            let with_und = labels.clone().with_undetermined("code");
            let und = with_und.get(UNDETERMINED).unwrap();
            assert!(labels.iter().any(|(_, v)| v == und), "und {und} not in {sample:?}");
        }
    }

    #[test]
    fn test_empty_text_ignored() {
        let labels = LabelMap::new().with("fi", "  ").with("en", "x");
        assert_eq!(labels.get("fi"), None);
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let labels = LabelMap::new().with("fi", "Suomi").with_undetermined("c");
        let value = serde_json::to_value(&labels).unwrap();
        assert_eq!(value, serde_json::json!({"fi": "Suomi", "und": "Suomi"}));
    }
}
