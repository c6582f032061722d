//! Album-based groups and the album selection policy

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::lookup::AlbumBucket;
use crate::model::{sort_newest_first, Group};

/// An album as listed by the album source, before its assets are fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumSummary {
    pub id: String,
    pub title: String,
    pub asset_count: usize,
}

/// Preference rank of an album title; lower is preferred
pub fn album_title_priority(title: &str) -> u8 {
    let t = title.to_lowercase();
    if t.contains("screenshot") {
        0
    } else if t == "camera" || t.contains("dcim") {
        1
    } else if t.contains("whatsapp") {
        2
    } else if t.contains("telegram") {
        3
    } else if t.contains("download") {
        4
    } else if t.contains("instagram") {
        5
    } else {
        10
    }
}

/// Non-empty albums ordered by title preference, then by size, capped at `max_albums`.
/// A repeated id keeps its first listing.
pub fn rank_albums(albums: &[AlbumSummary], max_albums: usize) -> Vec<AlbumSummary> {
    let mut seen = HashSet::new();
    let mut picked: Vec<AlbumSummary> = albums
        .iter()
        .filter(|a| a.asset_count > 0 && seen.insert(a.id.as_str()))
        .cloned()
        .collect();
    picked.sort_by_key(|a| (album_title_priority(&a.title), std::cmp::Reverse(a.asset_count)));
    picked.truncate(max_albums);
    picked
}

pub struct AlbumGrouper;

impl AlbumGrouper {
    /// One group per album, largest album first. Only the first bucket of a
    /// repeated album id is used.
    pub fn group(buckets: &[AlbumBucket]) -> Vec<Group<'_>> {
        let mut seen = HashSet::new();
        let mut groups: Vec<Group<'_>> = buckets
            .iter()
            .filter(|bucket| seen.insert(bucket.album_id.as_str()))
            .map(|bucket| {
                let mut items: Vec<_> = bucket.items.iter().collect();
                sort_newest_first(&mut items);
                Group::new(format!("alb_{}", bucket.album_id), bucket.title.clone(), items)
            })
            .collect();

        groups.sort_by_key(|g| std::cmp::Reverse(g.len()));
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PhotoRecord;

    fn album(id: &str, title: &str, count: usize) -> AlbumSummary {
        AlbumSummary {
            id: id.to_string(),
            title: title.to_string(),
            asset_count: count,
        }
    }

    fn bucket(id: &str, title: &str, times: &[i64]) -> AlbumBucket {
        AlbumBucket {
            album_id: id.to_string(),
            title: title.to_string(),
            items: times
                .iter()
                .map(|&t| PhotoRecord::new(format!("{}_{}", id, t), "", 1, 1).with_creation_time(Some(t)))
                .collect(),
        }
    }

    #[test]
    fn test_title_priority() {
        assert_eq!(album_title_priority("Screenshots"), 0);
        assert_eq!(album_title_priority("Camera"), 1);
        assert_eq!(album_title_priority("DCIM/100APPLE"), 1);
        assert_eq!(album_title_priority("Camera Roll"), 10);
        assert_eq!(album_title_priority("WhatsApp Images"), 2);
        assert_eq!(album_title_priority("Telegram"), 3);
        assert_eq!(album_title_priority("Download"), 4);
        assert_eq!(album_title_priority("Instagram"), 5);
        assert_eq!(album_title_priority("Holidays"), 10);
    }

    #[test]
    fn test_rank_albums_keyword_beats_count() {
        let albums = vec![album("r", "Random", 10), album("c", "Camera", 3), album("s", "Screenshots", 5)];
        let ranked: Vec<String> = rank_albums(&albums, 10).into_iter().map(|a| a.title).collect();
        assert_eq!(ranked, vec!["Screenshots", "Camera", "Random"]);
    }

    #[test]
    fn test_rank_albums_drops_empty_and_caps() {
        let albums = vec![
            album("a", "Trips", 4),
            album("b", "Empty", 0),
            album("c", "Pets", 9),
            album("d", "Food", 1),
        ];
        let ranked: Vec<String> = rank_albums(&albums, 2).into_iter().map(|a| a.id).collect();
        assert_eq!(ranked, vec!["c", "a"]);
    }

    #[test]
    fn test_groups_sorted_by_size() {
        let buckets = vec![
            bucket("small", "Small", &[5]),
            bucket("big", "Big", &[1, 3, 2]),
        ];
        let groups = AlbumGrouper::group(&buckets);

        assert_eq!(groups[0].key, "alb_big");
        assert_eq!(groups[0].title, "Big");
        assert_eq!(groups[0].ids(), vec!["big_3", "big_2", "big_1"]);
        assert_eq!(groups[1].key, "alb_small");
    }

    #[test]
    fn test_repeated_album_id_keeps_first_listing() {
        let albums = vec![album("x", "Camera", 3), album("x", "Camera copy", 7), album("y", "Pets", 2)];
        let ranked: Vec<String> = rank_albums(&albums, 10).into_iter().map(|a| a.title).collect();
        assert_eq!(ranked, vec!["Camera", "Pets"]);

        let buckets = vec![bucket("x", "First", &[1]), bucket("x", "Second", &[2, 3])];
        let groups = AlbumGrouper::group(&buckets);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title, "First");
    }
}
