//! Grouping by assigned content category

use crate::model::{sort_newest_first, ContentCategory, Group, PhotoRecord};

pub struct SemanticGrouper;

impl SemanticGrouper {
    /// One group per category in display order, including empty ones.
    /// Uncategorized photos land in `Other`.
    pub fn group<'a, I>(items: I) -> Vec<Group<'a>>
    where
        I: IntoIterator<Item = &'a PhotoRecord>,
    {
        let mut buckets: [Vec<&'a PhotoRecord>; 5] = Default::default();
        for photo in items {
            buckets[display_slot(photo.effective_category())].push(photo);
        }

        ContentCategory::DISPLAY_ORDER
            .iter()
            .zip(buckets)
            .map(|(category, mut items)| {
                sort_newest_first(&mut items);
                Group::new(format!("sem_{}", category), category.display_title(), items)
            })
            .collect()
    }
}

fn display_slot(category: ContentCategory) -> usize {
    ContentCategory::DISPLAY_ORDER
        .iter()
        .position(|c| *c == category)
        .unwrap_or(ContentCategory::DISPLAY_ORDER.len() - 1)
}
