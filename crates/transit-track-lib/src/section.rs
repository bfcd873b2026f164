//! Section partitioning
//!
//! A section is the stretch of a line between two consecutive real stops (or
//! the line's own ends). Geometry and vehicle motion are both computed per
//! section, so a vehicle only ever dwells at section boundaries.

use crate::{Line, Station, StationId};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A contiguous run of a line's stations bounded by real stops
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Section {
    /// Index of the first station of this section in the line's `station_ids`
    pub start: usize,
    /// Stations of this section, boundaries included
    pub station_ids: Vec<StationId>,
}

impl Section {
    /// Index of the last station of this section in the line's `station_ids`
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.station_ids.len().saturating_sub(1)
    }

    #[inline]
    pub fn first(&self) -> Option<&StationId> {
        self.station_ids.first()
    }

    #[inline]
    pub fn last(&self) -> Option<&StationId> {
        self.station_ids.last()
    }

    /// Station at which a vehicle enters this section in the given direction
    pub fn origin(&self, forward: bool) -> Option<&StationId> {
        if forward { self.first() } else { self.last() }
    }

    /// Station at which a vehicle leaves this section in the given direction
    pub fn terminus(&self, forward: bool) -> Option<&StationId> {
        if forward { self.last() } else { self.first() }
    }
}

/// Split a line into sections
///
/// A station closes the running section when it is a real stop for this line
/// or when it is the last station. Station ids missing from `stations` never
/// close a section but stay in place, so adjacency is preserved.
pub fn partition(line: &Line, stations: &HashMap<StationId, Station>) -> Vec<Section> {
    let ids = &line.station_ids;
    if ids.len() < 2 {
        return Vec::new();
    }

    let last_index = ids.len() - 1;
    let mut sections = Vec::new();
    let mut current = Section {
        start: 0,
        station_ids: vec![ids[0].clone()],
    };

    for (index, id) in ids.iter().enumerate().skip(1) {
        current.station_ids.push(id.clone());

        let is_stop = stations
            .get(id)
            .is_some_and(|station| !line.is_waypoint_for(station));

        if is_stop || index == last_index {
            let next = Section {
                start: index,
                station_ids: vec![id.clone()],
            };
            sections.push(std::mem::replace(&mut current, next));
        }
    }

    sections
}

/// Section holding the station at `index` of the line's `station_ids`
///
/// A boundary index belongs to the section that starts there; the final index
/// belongs to the last section.
pub fn section_containing(sections: &[Section], index: usize) -> Option<usize> {
    sections
        .iter()
        .position(|section| index >= section.start && index < section.end())
        .or_else(|| {
            let last = sections.len().checked_sub(1)?;
            (sections[last].end() == index).then_some(last)
        })
}
