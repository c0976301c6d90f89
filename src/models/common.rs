//! Building blocks shared by every resource record.

use std::collections::HashMap;

use serde::Deserialize;

/// A map of language code to localized text.
///
/// The API localizes titles and descriptions per language; most callers just
/// want "English or whatever exists".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct LocalizedString(pub HashMap<String, String>);

impl LocalizedString {
    /// The value for the given language code.
    pub fn get(&self, language: &str) -> Option<&str> {
        self.0.get(language).map(String::as_str)
    }

    /// The English value, or any value if no English one exists.
    pub fn preferred(&self) -> Option<&str> {
        self.get("en")
            .or_else(|| self.0.values().next().map(String::as_str))
    }

    /// Whether no localization exists at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A reference from one resource to another.
///
/// Resources carry their related records (authors, cover art, member manga)
/// as a flat relationship array discriminated by `type`. Attributes are kept
/// raw; each record type decodes the ones it understands.
#[derive(Debug, Clone, Deserialize)]
pub struct Relationship {
    /// ID of the referenced resource
    pub id: String,
    /// Kind of the referenced resource, e.g. `"author"` or `"manga"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Attributes included with the reference, if the query asked for them
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_falls_back_from_english() {
        let localized: LocalizedString =
            serde_json::from_value(serde_json::json!({"ja": "ワンピース"})).unwrap();
        assert_eq!(localized.preferred(), Some("ワンピース"));

        let localized: LocalizedString =
            serde_json::from_value(serde_json::json!({"en": "One Piece", "ja": "ワンピース"}))
                .unwrap();
        assert_eq!(localized.preferred(), Some("One Piece"));

        assert_eq!(LocalizedString::default().preferred(), None);
    }

    #[test]
    fn test_relationship_keeps_unknown_attributes_raw() {
        let rel: Relationship = serde_json::from_value(serde_json::json!({
            "id": "a1", "type": "author",
            "attributes": {"name": "Oda", "somethingNew": 42}
        }))
        .unwrap();
        assert_eq!(rel.kind, "author");
        assert!(rel.attributes.is_some());
    }
}
