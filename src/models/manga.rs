//! Manga records and the enums that classify them.

use serde::{Deserialize, Serialize};

use super::common::{LocalizedString, Relationship};
use super::primitives::MangaId;

/// Content rating attached to every manga.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRating {
    /// Safe for everyone
    #[default]
    Safe,
    /// Suggestive content
    Suggestive,
    /// Erotic content
    Erotica,
    /// Pornographic content
    Pornographic,
}

impl ContentRating {
    /// The wire value of this rating.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentRating::Safe => "safe",
            ContentRating::Suggestive => "suggestive",
            ContentRating::Erotica => "erotica",
            ContentRating::Pornographic => "pornographic",
        }
    }

    /// Whether this rating counts as adult content.
    pub fn is_adult(&self) -> bool {
        matches!(self, ContentRating::Erotica | ContentRating::Pornographic)
    }
}

/// Reading status of a manga in the user's library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    /// Currently reading
    Reading,
    /// On hold
    OnHold,
    /// Planned
    PlanToRead,
    /// Dropped
    Dropped,
    /// Reading again
    ReReading,
    /// Finished
    Completed,
}

/// A manga record.
#[derive(Debug, Clone, Deserialize)]
pub struct Manga {
    /// Manga ID
    pub id: MangaId,
    /// Manga attributes
    #[serde(default)]
    pub attributes: MangaAttributes,
    /// Related records (authors, artists, cover art)
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// The attribute block of a manga record. Fields the crate does not model
/// are dropped at decode time, deliberately.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaAttributes {
    /// Localized titles
    #[serde(default)]
    pub title: LocalizedString,
    /// Alternative titles, one localization map per entry
    #[serde(default)]
    pub alt_titles: Vec<LocalizedString>,
    /// Localized descriptions
    #[serde(default)]
    pub description: LocalizedString,
    /// Content rating
    #[serde(default)]
    pub content_rating: ContentRating,
    /// Publication status, e.g. `"ongoing"`
    #[serde(default)]
    pub status: Option<String>,
    /// Year of release
    #[serde(default)]
    pub year: Option<i32>,
    /// Original language code
    #[serde(default)]
    pub original_language: Option<String>,
}

impl Manga {
    /// The manga's title, preferring English.
    pub fn title(&self) -> Option<&str> {
        self.attributes.title.preferred()
    }

    /// The manga's description, preferring English.
    pub fn description(&self) -> Option<&str> {
        self.attributes.description.preferred()
    }

    /// Whether this manga is adult content.
    pub fn is_adult(&self) -> bool {
        self.attributes.content_rating.is_adult()
    }

    /// Authors included in the record's relationships.
    pub fn authors(&self) -> Vec<Author> {
        self.people("author")
    }

    /// Artists included in the record's relationships.
    pub fn artists(&self) -> Vec<Author> {
        self.people("artist")
    }

    /// File name of the cover art, if included.
    pub fn cover_file_name(&self) -> Option<String> {
        self.relationships
            .iter()
            .find(|rel| rel.kind == "cover_art")
            .and_then(|rel| rel.attributes.as_ref())
            .and_then(|attrs| attrs.get("fileName"))
            .and_then(|name| name.as_str())
            .map(String::from)
    }

    fn people(&self, kind: &str) -> Vec<Author> {
        self.relationships
            .iter()
            .filter(|rel| rel.kind == kind)
            .map(|rel| Author {
                id: rel.id.clone(),
                name: rel
                    .attributes
                    .as_ref()
                    .and_then(|attrs| attrs.get("name"))
                    .and_then(|name| name.as_str())
                    .map(String::from),
            })
            .collect()
    }
}

/// An author or artist referenced by a manga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Author ID
    pub id: String,
    /// Author name, if the query included attributes
    pub name: Option<String>,
}
