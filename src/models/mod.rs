//! Typed records for API resources.
//!
//! Every resource is an explicit serde record; fields the crate does not
//! model are dropped at decode time rather than dynamically attached.

mod chapter;
mod common;
mod list;
mod manga;
mod primitives;
mod user;

pub use chapter::{Chapter, ChapterAttributes};
pub use common::{LocalizedString, Relationship};
pub use list::{ListAttributes, MangaList};
pub use manga::{Author, ContentRating, Manga, MangaAttributes, ReadingStatus};
pub use primitives::{ChapterId, ListId, MangaId, UserId};
pub use user::{User, UserAttributes};
