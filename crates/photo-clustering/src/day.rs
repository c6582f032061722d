//! Grouping by local calendar day

use std::collections::HashMap;

use chrono::FixedOffset;

use crate::model::{sort_newest_first, Group, PhotoRecord};
use crate::time::{day_key, format_day_title};

pub struct DayGrouper {
    tz: FixedOffset,
}

impl DayGrouper {
    pub fn new(tz: FixedOffset) -> Self {
        Self { tz }
    }

    /// Bucket photos by day, newest photo first inside each day.
    ///
    /// Days are ordered by descending key string. `unknown_day` compares
    /// above every `YYYY-MM-DD` key and therefore comes first.
    pub fn group<'a, I>(&self, items: I) -> Vec<Group<'a>>
    where
        I: IntoIterator<Item = &'a PhotoRecord>,
    {
        let mut sorted: Vec<&'a PhotoRecord> = items.into_iter().collect();
        sort_newest_first(&mut sorted);

        let mut buckets: HashMap<String, Vec<&'a PhotoRecord>> = HashMap::new();
        for photo in sorted {
            buckets
                .entry(day_key(photo.created_secs(), &self.tz))
                .or_default()
                .push(photo);
        }

        let mut days: Vec<(String, Vec<&'a PhotoRecord>)> = buckets.into_iter().collect();
        days.sort_by(|a, b| b.0.cmp(&a.0));

        days.into_iter()
            .map(|(key, items)| Group::new(format!("day_{}", key), format_day_title(&key), items))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(id: &str, secs: Option<i64>) -> PhotoRecord {
        PhotoRecord::new(id, id, 10, 10).with_creation_time(secs)
    }

    fn grouper() -> DayGrouper {
        DayGrouper::new(FixedOffset::east_opt(0).unwrap())
    }

    const JAN_15: i64 = 1_705_276_800; // 2024-01-15 00:00:00 UTC
    const DAY: i64 = 86_400;

    #[test]
    fn test_groups_by_day_newest_first() {
        let photos = vec![
            photo("a", Some(JAN_15 + 100)),
            photo("b", Some(JAN_15 + DAY + 50)),
            photo("c", Some(JAN_15 + 5000)),
            photo("d", Some(JAN_15 + DAY + 10)),
        ];

        let groups = grouper().group(&photos);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "day_2024-01-16");
        assert_eq!(groups[0].title, "Tue, Jan 16, 2024");
        assert_eq!(groups[0].ids(), vec!["b", "d"]);
        assert_eq!(groups[1].key, "day_2024-01-15");
        assert_eq!(groups[1].ids(), vec!["c", "a"]);
    }

    #[test]
    fn test_unknown_day_sorts_by_key_string() {
        let photos = vec![photo("a", Some(JAN_15)), photo("b", None)];
        let groups = grouper().group(&photos);

        assert_eq!(groups[0].key, "day_unknown_day");
        assert_eq!(groups[0].title, "Unknown day");
        assert_eq!(groups[1].key, "day_2024-01-15");
    }

    #[test]
    fn test_local_offset_moves_day_boundary() {
        let photos = vec![photo("a", Some(JAN_15 - 60))];
        let east = DayGrouper::new(FixedOffset::east_opt(3600).unwrap());
        assert_eq!(east.group(&photos)[0].key, "day_2024-01-15");
        assert_eq!(grouper().group(&photos)[0].key, "day_2024-01-14");
    }

    #[test]
    fn test_grouping_is_idempotent() {
        let photos: Vec<PhotoRecord> = (0..20)
            .map(|i| photo(&format!("p{}", i), if i % 7 == 0 { None } else { Some(JAN_15 + i * 20_000) }))
            .collect();

        let first = grouper().group(&photos);
        let second = grouper().group(&photos);
        assert_eq!(first, second);
    }
}
