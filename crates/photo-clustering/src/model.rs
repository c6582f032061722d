//! Photo records and the groups produced from them
//!
//! A `PhotoRecord` is owned by the session photo list and borrowed by every
//! grouping call. Groups are rebuilt from scratch on each call and only hold
//! references into the caller's records.

use serde::{Deserialize, Serialize};

use crate::time::to_secs;

/// Coarse content taxonomy used for semantic grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Nature,
    Food,
    Pets,
    People,
    Other,
}

impl ContentCategory {
    /// Fixed display order of the semantic buckets
    pub const DISPLAY_ORDER: [ContentCategory; 5] = [
        ContentCategory::People,
        ContentCategory::Pets,
        ContentCategory::Food,
        ContentCategory::Nature,
        ContentCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Nature => "nature",
            ContentCategory::Food => "food",
            ContentCategory::Pets => "pets",
            ContentCategory::People => "people",
            ContentCategory::Other => "other",
        }
    }

    pub fn display_title(&self) -> &'static str {
        match self {
            ContentCategory::Nature => "Nature",
            ContentCategory::Food => "Food",
            ContentCategory::Pets => "Pets",
            ContentCategory::People => "People",
            ContentCategory::Other => "Other / Unclassified",
        }
    }
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nature" => Ok(ContentCategory::Nature),
            "food" => Ok(ContentCategory::Food),
            "pets" => Ok(ContentCategory::Pets),
            "people" => Ok(ContentCategory::People),
            "other" => Ok(ContentCategory::Other),
            _ => Err(format!("Invalid content category: {}", s)),
        }
    }
}

/// One (class index, score) entry of a classifier output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub index: usize,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Stable asset identifier
    pub id: String,
    /// Resource handle for the image bytes
    pub uri: String,
    pub width: u32,
    pub height: u32,
    /// Creation time in whole seconds since epoch
    pub creation_time: Option<i64>,
    pub category: Option<ContentCategory>,
    pub confidence: Option<f32>,
    pub top: Option<Vec<ClassScore>>,
    pub debug_label: Option<String>,
}

impl PhotoRecord {
    /// Create a record with no classification data
    pub fn new(id: impl Into<String>, uri: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            width,
            height,
            creation_time: None,
            category: None,
            confidence: None,
            top: None,
            debug_label: None,
        }
    }

    pub fn with_creation_time(mut self, raw: Option<i64>) -> Self {
        self.creation_time = to_secs(raw);
        self
    }

    /// Normalized creation time; `None` when unknown
    pub fn created_secs(&self) -> Option<i64> {
        to_secs(self.creation_time)
    }

    /// Sort key used by every "newest first" ordering; unknown times sort as 0
    pub(crate) fn sort_secs(&self) -> i64 {
        self.created_secs().unwrap_or(0)
    }

    /// The category used for grouping. Uncategorized photos count as `Other`.
    pub fn effective_category(&self) -> ContentCategory {
        self.category.unwrap_or(ContentCategory::Other)
    }

    pub fn is_categorized(&self) -> bool {
        self.category.is_some()
    }
}

/// A named, ordered bucket of photos
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group<'a> {
    /// Unique within one grouping call
    pub key: String,
    pub title: String,
    pub items: Vec<&'a PhotoRecord>,
}

impl<'a> Group<'a> {
    pub fn new(key: impl Into<String>, title: impl Into<String>, items: Vec<&'a PhotoRecord>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Creation time of the first item, which is the newest for every
    /// grouping that sorts newest first
    pub fn newest_secs(&self) -> i64 {
        self.items.first().map(|p| p.sort_secs()).unwrap_or(0)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|p| p.id.as_str()).collect()
    }
}

/// Sort photos newest first. Stable, so equal times keep input order.
pub fn sort_newest_first(items: &mut [&PhotoRecord]) {
    items.sort_by_key(|p| std::cmp::Reverse(p.sort_secs()));
}
