//! Folding fine-grained classifier labels into the display taxonomy
//!
//! The classifier emits scores over hundreds of ImageNet-style labels. Ranked
//! outputs are walked best first and the first confident label that maps to a
//! non-`Other` category wins.

use serde::{Deserialize, Serialize};

use crate::model::{ClassScore, ContentCategory};

/// Default minimum score for a ranked entry to be considered
pub const MIN_TOP_SCORE: f32 = 0.07;

/// Output length of classifiers that reserve index 0 for "background"
const BACKGROUND_SHIFTED_LEN: usize = 1001;

pub const FOOD: &[&str] = &[
    "pizza", "cheeseburger", "hotdog", "spaghetti", "ice cream", "banana", "apple",
    "strawberry", "coffee", "espresso", "plate", "burrito", "sushi", "wine", "cup",
    "restaurant", "menu", "guacamole", "bagel", "pretzel", "lemon", "orange", "pineapple",
    "fig", "pomegranate", "mushroom", "broccoli", "cauliflower", "cucumber", "bell pepper",
    "meat loaf", "carbonara", "potpie", "hot pot", "trifle", "french loaf", "sandwich",
    "ice_lolly",
];

pub const PETS: &[&str] = &[
    "dog", "puppy", "cat", "kitten", "tabby", "tiger cat", "siamese", "persian", "retriever",
    "labrador", "pug", "husky", "chihuahua", "pomeranian", "samoyed", "dalmatian",
    "golden retriever",
];

pub const NATURE: &[&str] = &[
    "tree", "forest", "mountain", "valley", "lakeside", "seashore", "cliff", "volcano",
    "river", "waterfall", "meadow", "coral reef", "snow", "beach", "lake", "ocean", "sky",
    "alp", "promontory", "sandbar", "geyser",
];

pub const PEOPLE: &[&str] = &[
    "groom", "bride", "bridegroom", "dancer", "baby", "soldier", "police", "fireman",
];

/// Keyword tables in priority order
const KEYWORD_TABLES: [(ContentCategory, &[&str]); 4] = [
    (ContentCategory::Food, FOOD),
    (ContentCategory::Pets, PETS),
    (ContentCategory::Nature, NATURE),
    (ContentCategory::People, PEOPLE),
];

/// Map a raw label to a category by case-insensitive substring match
pub fn label_to_category(label: &str) -> ContentCategory {
    let label = label.to_lowercase();
    KEYWORD_TABLES
        .iter()
        .find(|(_, words)| words.iter().any(|w| label.contains(w)))
        .map(|(category, _)| *category)
        .unwrap_or(ContentCategory::Other)
}

/// The `k` highest scores, descending. Ties keep their original index order.
pub fn top_k(scores: &[f32], k: usize) -> Vec<ClassScore> {
    let mut items: Vec<ClassScore> = scores
        .iter()
        .enumerate()
        .map(|(index, &score)| ClassScore { index, score })
        .collect();
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
    items.truncate(k);
    items
}

/// Outcome of walking the ranked classifier outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPick {
    pub category: ContentCategory,
    pub score: f32,
    /// Label that produced the category, when one did
    pub label: Option<String>,
    /// 1-based rank of that label in the ranked list
    pub rank: Option<usize>,
}

/// Resolves ranked classifier outputs against a label table
pub struct CategoryResolver<'l, L> {
    labels: &'l [L],
    min_score: f32,
}

impl<'l, L: AsRef<str>> CategoryResolver<'l, L> {
    pub fn new(labels: &'l [L]) -> Self {
        Self::with_min_score(labels, MIN_TOP_SCORE)
    }

    pub fn with_min_score(labels: &'l [L], min_score: f32) -> Self {
        Self { labels, min_score }
    }

    /// Pick the first confident, labeled entry whose category is not `Other`.
    ///
    /// `scores_len` is the length of the full score vector; a 1001-long
    /// vector shifts every index down by one to skip the background class.
    /// With no qualifying entry the result is `Other` with the top score.
    pub fn resolve(&self, top: &[ClassScore], scores_len: usize) -> CategoryPick {
        let shift = usize::from(scores_len == BACKGROUND_SHIFTED_LEN);

        for (rank, entry) in top.iter().enumerate() {
            if entry.score < self.min_score {
                continue;
            }
            let Some(idx) = entry.index.checked_sub(shift) else {
                continue;
            };
            let Some(label) = self.labels.get(idx).map(|l| l.as_ref()) else {
                continue;
            };
            if label.is_empty() {
                continue;
            }

            let category = label_to_category(label);
            if category != ContentCategory::Other {
                return CategoryPick {
                    category,
                    score: entry.score,
                    label: Some(label.to_string()),
                    rank: Some(rank + 1),
                };
            }
        }

        CategoryPick {
            category: ContentCategory::Other,
            score: top.first().map(|t| t.score).unwrap_or(0.0),
            label: None,
            rank: None,
        }
    }
}
