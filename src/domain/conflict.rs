//! Same-assignee overlap detection for the occurrences of one date.

use crate::domain::occurrence::Occurrence;
use std::collections::{BTreeSet, HashMap};

pub const TEAM_ASSIGNEE: &str = "team";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConflictPair {
    pub assignee: String,
    pub first: String,
    pub second: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDetector {
    unassigned: BTreeSet<String>,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new([TEAM_ASSIGNEE.to_string()])
    }
}

impl ConflictDetector {
    /// `unassigned` lists sentinel assignees (compared case-insensitively) that never conflict.
    pub fn new(unassigned: impl IntoIterator<Item = String>) -> Self {
        Self {
            unassigned: unassigned
                .into_iter()
                .map(|name| name.trim().to_ascii_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    pub fn annotate(&self, mut occurrences: Vec<Occurrence>) -> Vec<Occurrence> {
        self.annotate_in_place(&mut occurrences);
        occurrences
    }

    pub fn annotate_in_place(&self, occurrences: &mut [Occurrence]) {
        for occurrence in occurrences.iter_mut() {
            occurrence.has_conflict = false;
        }
        for (left, right) in self.overlapping_indices(occurrences) {
            occurrences[left].has_conflict = true;
            occurrences[right].has_conflict = true;
        }
    }

    /// Every overlapping pair, each reported once with the earlier-starting occurrence first.
    pub fn conflicting_pairs(&self, occurrences: &[Occurrence]) -> Vec<ConflictPair> {
        self.overlapping_indices(occurrences)
            .into_iter()
            .map(|(left, right)| ConflictPair {
                assignee: occurrences[left].assigned_to.clone().unwrap_or_default(),
                first: occurrences[left].id.clone(),
                second: occurrences[right].id.clone(),
            })
            .collect()
    }

    fn assignee_key(&self, occurrence: &Occurrence) -> Option<String> {
        let assignee = occurrence.assigned_to.as_deref()?.trim();
        if assignee.is_empty() {
            return None;
        }
        let key = assignee.to_ascii_lowercase();
        (!self.unassigned.contains(&key)).then_some(key)
    }

    fn overlapping_indices(&self, occurrences: &[Occurrence]) -> Vec<(usize, usize)> {
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, occurrence) in occurrences.iter().enumerate() {
            if let Some(key) = self.assignee_key(occurrence) {
                groups.entry(key).or_default().push(index);
            }
        }

        let mut pairs = Vec::new();
        for mut group in groups.into_values() {
            group.sort_by_key(|index| {
                (occurrences[*index].start_minute, occurrences[*index].end_minute)
            });

            // Sweep: an interval stays active until a later start reaches its end.
            let mut active: Vec<usize> = Vec::new();
            for index in group {
                let start = occurrences[index].start_minute;
                active.retain(|open| occurrences[*open].end_minute > start);
                for open in &active {
                    pairs.push((*open, index));
                }
                active.push(index);
            }
        }
        pairs
    }
}
