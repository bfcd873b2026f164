//! Interline segment building
//!
//! Finds track shared by several lines, merges it into maximal segments and
//! assigns every pattern a lateral offset so parallel tracks render side by
//! side instead of on top of each other.
//!
//! The build runs in three phases:
//!
//! 1. **Unit segmentation**: every adjacent station pair of every line becomes a
//!    unit segment tagged with the patterns of all lines using that pair.
//! 2. **Chain merging**: unit segments with the same pattern set are spliced
//!    at shared endpoints into chains until no splice remains.
//! 3. **Offset assignment**: patterns are spread around the centre line, one
//!    track thickness apart.
//!
//! Output never depends on the order lines are handed in.

use crate::{Line, LineId, Station, StationId};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default rendered track thickness, in display units
pub const DEFAULT_TRACK_THICKNESS: f64 = 6.0;

/// Separator used in canonical segment keys
const KEY_SEPARATOR: &str = "|";

/// How a line renders along a segment
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pattern {
    pub color: String,
    pub icon: Option<String>,
}

impl Pattern {
    pub fn new(color: impl Into<String>, icon: Option<String>) -> Self {
        Self {
            color: color.into(),
            icon,
        }
    }

    /// Stable textual form, used to key pattern sets
    pub fn key(&self) -> String {
        match &self.icon {
            Some(icon) => format!("{}:{icon}", self.color),
            None => self.color.clone(),
        }
    }
}

/// Patterns of one segment, kept sorted and free of duplicates
pub type PatternSet = SmallVec<[Pattern; 4]>;

/// One maximal stretch of track with a constant set of patterns
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InterlineSegment {
    /// Canonical key, the station ids joined in canonical order
    pub key: String,
    /// Ordered stations, lexicographically larger boundary first
    pub station_ids: Vec<StationId>,
    /// Sorted patterns traveling this segment
    pub patterns: PatternSet,
    /// Lateral offset of `patterns[i]` in display units
    pub offsets: SmallVec<[f64; 4]>,
    /// Lines contributing to this segment
    pub line_ids: BTreeSet<LineId>,
}

impl InterlineSegment {
    /// Offset of `pattern` on this segment
    pub fn offset_of(&self, pattern: &Pattern) -> Option<f64> {
        let index = self.patterns.iter().position(|p| p == pattern)?;
        self.offsets.get(index).copied()
    }

    /// Whether more than one pattern shares this segment
    pub fn is_shared(&self) -> bool {
        self.patterns.len() > 1
    }
}

/// Which lines visit which station
#[derive(Clone, Debug, Default)]
pub struct StationLineIndex {
    lines_by_station: HashMap<StationId, BTreeSet<LineId>>,
}

impl StationLineIndex {
    pub fn build<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a Line>,
    {
        let mut lines_by_station: HashMap<StationId, BTreeSet<LineId>> = HashMap::new();
        for line in lines {
            for id in &line.station_ids {
                lines_by_station
                    .entry(id.clone())
                    .or_default()
                    .insert(line.id.clone());
            }
        }
        Self { lines_by_station }
    }

    /// Lines visiting `station`
    pub fn lines_at(&self, station: &str) -> impl Iterator<Item = &LineId> {
        self.lines_by_station
            .get(station)
            .into_iter()
            .flat_map(|lines| lines.iter())
    }

    /// Lines visiting both `a` and `b`, in id order
    pub fn lines_visiting_both(&self, a: &str, b: &str) -> Vec<&LineId> {
        match (self.lines_by_station.get(a), self.lines_by_station.get(b)) {
            (Some(at_a), Some(at_b)) => at_a.intersection(at_b).collect(),
            _ => Vec::new(),
        }
    }
}

/// A unit segment under construction
#[derive(Debug, Default)]
struct UnitSegment {
    patterns: PatternSet,
    line_ids: BTreeSet<LineId>,
}

impl UnitSegment {
    fn add(&mut self, pattern: Pattern, line_id: &LineId) {
        if let Err(position) = self.patterns.binary_search(&pattern) {
            self.patterns.insert(position, pattern);
        }
        self.line_ids.insert(line_id.clone());
    }
}

/// A chain of stations being merged
#[derive(Debug)]
struct Chain {
    stations: VecDeque<StationId>,
    line_ids: BTreeSet<LineId>,
}

impl Chain {
    fn is_closed(&self) -> bool {
        self.stations.len() > 2 && self.stations.front() == self.stations.back()
    }

    /// Join `other` onto this chain at a shared endpoint
    fn splice(&mut self, other: &Chain) -> bool {
        if self.is_closed() || other.is_closed() {
            return false;
        }
        let (Some(first), Some(last)) = (
            self.stations.front().cloned(),
            self.stations.back().cloned(),
        ) else {
            return false;
        };
        let (Some(other_first), Some(other_last)) = (other.stations.front(), other.stations.back())
        else {
            return false;
        };

        if &last == other_first {
            self.stations.extend(other.stations.iter().skip(1).cloned());
        } else if &last == other_last {
            self.stations
                .extend(other.stations.iter().rev().skip(1).cloned());
        } else if &first == other_last {
            for id in other.stations.iter().rev().skip(1) {
                self.stations.push_front(id.clone());
            }
        } else if &first == other_first {
            for id in other.stations.iter().skip(1) {
                self.stations.push_front(id.clone());
            }
        } else {
            return false;
        }

        self.line_ids.extend(other.line_ids.iter().cloned());
        true
    }

    /// Orient so the lexicographically larger boundary comes first
    fn into_canonical(self) -> Vec<StationId> {
        let forward: Vec<StationId> = self.stations.into_iter().collect();
        let mut reversed = forward.clone();
        reversed.reverse();

        let (first, last) = (forward.first(), forward.last());
        let keep = if first != last {
            first > last
        } else {
            forward >= reversed
        };

        if keep { forward } else { reversed }
    }
}

/// Strict adjacency of `a` and `b` anywhere in `sequence`, in either order
fn adjacent_in(sequence: &[&StationId], a: &str, b: &str) -> bool {
    sequence.windows(2).any(|pair| {
        let (x, y) = (pair[0].as_str(), pair[1].as_str());
        (x == a && y == b) || (x == b && y == a)
    })
}

/// Canonical key of a station path
pub fn segment_key(station_ids: &[StationId]) -> String {
    station_ids.join(KEY_SEPARATOR)
}

/// Lateral offsets for `count` patterns, `thickness` apart
///
/// An odd count centres the first pattern on the track; the rest alternate
/// left and right with growing magnitude. An even count straddles the centre.
pub fn assign_offsets(count: usize, thickness: f64) -> SmallVec<[f64; 4]> {
    let centred = count % 2 == 1;
    (0..count)
        .map(|i| {
            if centred {
                if i == 0 {
                    return 0.0;
                }
                let step = i.div_ceil(2) as f64;
                if i % 2 == 1 {
                    step * thickness
                } else {
                    -step * thickness
                }
            } else {
                let step = (i / 2) as f64 + 0.5;
                if i % 2 == 0 {
                    step * thickness
                } else {
                    -step * thickness
                }
            }
        })
        .collect()
}

/// Build all interline segments for `lines`
///
/// # Arguments
/// * `lines` - Lines to consider, in any order
/// * `stations` - Station lookup; missing ids are dropped from adjacency
/// * `index` - Which lines visit which station
/// * `thickness` - Rendered track thickness, the offset step
///
/// # Returns
/// Segments keyed by canonical path
pub fn build_segments<'a, I>(
    lines: I,
    stations: &HashMap<StationId, Station>,
    index: &StationLineIndex,
    thickness: f64,
) -> BTreeMap<String, InterlineSegment>
where
    I: IntoIterator<Item = &'a Line>,
{
    #[cfg(feature = "profiling")]
    profiling::scope!("interline::build_segments");

    let lines: Vec<&Line> = lines.into_iter().collect();
    let by_id: HashMap<&str, &Line> = lines.iter().map(|l| (l.id.as_str(), *l)).collect();

    // Station sequences with missing references removed
    let resolved: HashMap<&str, Vec<&StationId>> = lines
        .iter()
        .map(|line| {
            let sequence = line
                .station_ids
                .iter()
                .filter(|id| stations.contains_key(*id))
                .collect();
            (line.id.as_str(), sequence)
        })
        .collect();

    // Phase 1: unit segments keyed by the unordered station pair
    let mut units: BTreeMap<(StationId, StationId), UnitSegment> = BTreeMap::new();
    for line in &lines {
        let Some(sequence) = resolved.get(line.id.as_str()) else {
            continue;
        };

        for pair in sequence.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a == b {
                continue;
            }
            let key = if a < b {
                (a.clone(), b.clone())
            } else {
                (b.clone(), a.clone())
            };
            let unit = units.entry(key).or_default();
            unit.add(line.pattern(), &line.id);

            for other_id in index.lines_visiting_both(a, b) {
                if *other_id == line.id {
                    continue;
                }
                let (Some(other), Some(other_sequence)) =
                    (by_id.get(other_id.as_str()), resolved.get(other_id.as_str()))
                else {
                    continue;
                };
                if adjacent_in(other_sequence, a, b) {
                    unit.add(other.pattern(), &other.id);
                }
            }
        }
    }

    // Phase 2: group by pattern set and splice chains
    let mut groups: BTreeMap<String, (PatternSet, Vec<Chain>)> = BTreeMap::new();
    for ((a, b), unit) in units {
        let group_key = unit
            .patterns
            .iter()
            .map(Pattern::key)
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR);
        let entry = groups
            .entry(group_key)
            .or_insert_with(|| (unit.patterns.clone(), Vec::new()));
        entry.1.push(Chain {
            stations: VecDeque::from([a, b]),
            line_ids: unit.line_ids,
        });
    }

    let mut segments = BTreeMap::new();
    for (patterns, chains) in groups.into_values() {
        let offsets = assign_offsets(patterns.len(), thickness);

        for chain in merge_chains(chains) {
            let line_ids = chain.line_ids.clone();
            let station_ids = chain.into_canonical();
            let key = segment_key(&station_ids);

            segments.insert(
                key.clone(),
                InterlineSegment {
                    key,
                    station_ids,
                    patterns: patterns.clone(),
                    offsets: offsets.clone(),
                    line_ids,
                },
            );
        }
    }

    tracing::debug!(
        "Built {} interline segments from {} lines",
        segments.len(),
        lines.len()
    );
    segments
}

/// Splice chains sharing an endpoint until no splice remains
fn merge_chains(mut chains: Vec<Chain>) -> Vec<Chain> {
    'restart: loop {
        for i in 0..chains.len() {
            for j in (i + 1)..chains.len() {
                let (head, tail) = chains.split_at_mut(j);
                if head[i].splice(&tail[0]) {
                    chains.remove(j);
                    continue 'restart;
                }
            }
        }
        return chains;
    }
}

/// Keys whose rendering changed between two segment mappings
///
/// A key changed when it is present in only one mapping, or in both with a
/// different pattern list or different offsets.
pub fn diff_segments(
    old: &BTreeMap<String, InterlineSegment>,
    new: &BTreeMap<String, InterlineSegment>,
) -> BTreeSet<String> {
    let mut changed: BTreeSet<String> = old
        .keys()
        .filter(|key| !new.contains_key(*key))
        .cloned()
        .collect();

    for (key, segment) in new {
        match old.get(key) {
            Some(previous)
                if previous.patterns == segment.patterns && previous.offsets == segment.offsets => {}
            _ => {
                changed.insert(key.clone());
            }
        }
    }

    changed
}
