use serde::Deserialize;
use super::lenient;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BookmarksResponse {
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
}

/// A locator or vengeance entry, in map tile coordinates
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Bookmark {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::int")]
    pub x: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub y: i64,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub level: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub rank: Option<String>,
}

impl Bookmark {
    /// Vengeance targets worth skipping: rank 3 and 4, and rank 2 above level 100
    pub fn too_strong_for_vengeance(&self) -> bool {
        match self.rank.as_deref() {
            Some("3") | Some("4") => true,
            Some("2") => self.level.unwrap_or(0) > 100,
            _ => false,
        }
    }
}
