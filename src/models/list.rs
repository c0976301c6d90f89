//! MangaDex list records.

use serde::Deserialize;

use super::common::Relationship;
use super::primitives::{ListId, MangaId, UserId};

/// A MangaDex list (a user-curated collection of manga).
#[derive(Debug, Clone, Deserialize)]
pub struct MangaList {
    /// List ID
    pub id: ListId,
    /// List attributes
    pub attributes: ListAttributes,
    /// Related records; membership lives here as `manga` relationships
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// The attribute block of a list record.
#[derive(Debug, Clone, Deserialize)]
pub struct ListAttributes {
    /// List name
    pub name: String,
    /// `"public"` or `"private"`
    #[serde(default)]
    pub visibility: Option<String>,
}

impl MangaList {
    /// The list's name.
    pub fn name(&self) -> &str {
        &self.attributes.name
    }

    /// IDs of every manga in the list, in list order.
    pub fn manga_ids(&self) -> Vec<MangaId> {
        self.relationships
            .iter()
            .filter(|rel| rel.kind == "manga")
            .map(|rel| MangaId::new(rel.id.clone()))
            .collect()
    }

    /// ID of the owning user, if present.
    pub fn owner(&self) -> Option<UserId> {
        self.relationships
            .iter()
            .find(|rel| rel.kind == "user")
            .map(|rel| UserId::new(rel.id.clone()))
    }

    /// Total manga in the list.
    pub fn total(&self) -> usize {
        self.relationships
            .iter()
            .filter(|rel| rel.kind == "manga")
            .count()
    }
}

impl std::fmt::Display for MangaList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} total)", self.name(), self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_projection() {
        let list: MangaList = serde_json::from_value(serde_json::json!({
            "id": "l-1",
            "attributes": {"name": "Favorites", "visibility": "private"},
            "relationships": [
                {"id": "m-1", "type": "manga"},
                {"id": "m-2", "type": "manga"},
                {"id": "u-1", "type": "user"}
            ]
        }))
        .unwrap();

        assert_eq!(list.manga_ids(), vec![MangaId::new("m-1"), MangaId::new("m-2")]);
        assert_eq!(list.owner(), Some(UserId::new("u-1")));
        assert_eq!(list.total(), 2);
        assert_eq!(list.to_string(), "Favorites (2 total)");
    }
}
