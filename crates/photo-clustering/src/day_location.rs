//! Day groups subdivided by place

use crate::day::DayGrouper;
use crate::location::LocationGrouper;
use crate::lookup::{CityNameLookup, LocationLookup};
use crate::model::{Group, PhotoRecord};

pub struct DayLocationGrouper {
    days: DayGrouper,
    locations: LocationGrouper,
}

impl DayLocationGrouper {
    pub fn new(days: DayGrouper, locations: LocationGrouper) -> Self {
        Self { days, locations }
    }

    /// Day groups in day order, each split by location. Location buckets are
    /// never merged across days.
    pub fn group<'a, I>(&self, items: I, locations: &LocationLookup, cities: &CityNameLookup) -> Vec<Group<'a>>
    where
        I: IntoIterator<Item = &'a PhotoRecord>,
    {
        let mut out = Vec::new();
        for day in self.days.group(items) {
            for place in self.locations.group(day.items.iter().copied(), locations, cities) {
                out.push(Group::new(
                    format!("dl_{}__{}", day.key, place.key),
                    format!("{} • {}", day.title, place.title),
                    place.items,
                ));
            }
        }
        out
    }
}
