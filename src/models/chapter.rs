//! Chapter records from the manga feed.

use serde::Deserialize;

use super::common::Relationship;
use super::primitives::ChapterId;

/// One chapter out of a manga's feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Chapter {
    /// Chapter ID
    pub id: ChapterId,
    /// Chapter attributes
    #[serde(default)]
    pub attributes: ChapterAttributes,
    /// Related records (scanlation group, uploader)
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// The attribute block of a chapter record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterAttributes {
    /// Volume number, as the uploader labelled it
    #[serde(default)]
    pub volume: Option<String>,
    /// Chapter number, as the uploader labelled it
    #[serde(default)]
    pub chapter: Option<String>,
    /// Chapter title
    #[serde(default)]
    pub title: Option<String>,
    /// Language of the translation
    #[serde(default)]
    pub translated_language: Option<String>,
    /// Number of pages
    #[serde(default)]
    pub pages: Option<i32>,
    /// Set when the chapter is hosted outside MangaDex
    #[serde(default)]
    pub external_url: Option<String>,
}

impl Chapter {
    /// Name of the scanlation group, if included.
    pub fn group_name(&self) -> Option<String> {
        self.relationships
            .iter()
            .find(|rel| rel.kind == "scanlation_group")
            .and_then(|rel| rel.attributes.as_ref())
            .and_then(|attrs| attrs.get("name"))
            .and_then(|name| name.as_str())
            .map(String::from)
    }
}
