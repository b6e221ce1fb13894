use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use observations_core::{parse_timestamp, EncounterMetadata, ObservationsByEncounter};

use crate::extract::Partition;

#[derive(Default)]
struct EncounterBuckets {
    buckets: Vec<ObservationsByEncounter>,
    positions: HashMap<String, usize>,
}

impl EncounterBuckets {
    fn bucket(&mut self, encounter: &EncounterMetadata) -> &mut ObservationsByEncounter {
        let position = match self.positions.get(&encounter.id) {
            Some(position) => *position,
            None => {
                let mut bucket = ObservationsByEncounter::new(encounter.id.clone());
                bucket.encounter = Some(encounter.clone());
                self.buckets.push(bucket);
                self.positions.insert(encounter.id.clone(), self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[position]
    }
}

/// Buckets observations by encounter id, in first-seen order.
///
/// Standalone observations are placed before groups. Observations without
/// encounter metadata are dropped; the second value counts them.
pub fn group_by_encounter(partition: Partition) -> (Vec<ObservationsByEncounter>, usize) {
    let mut buckets = EncounterBuckets::default();
    let mut dropped = 0;

    for observation in partition.standalone {
        if let Some(encounter) = &observation.encounter {
            let bucket = buckets.bucket(encounter);
            bucket.observations.push(observation);
        } else {
            dropped += 1;
        }
    }

    for group in partition.grouped {
        if let Some(encounter) = &group.observation.encounter {
            let bucket = buckets.bucket(encounter);
            bucket.grouped_observations.push(group);
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, "dropped observations without a resolvable encounter");
    }

    (buckets.buckets, dropped)
}

/// Newest encounter first. Dates that are present but unreadable come after
/// every parsed date and before buckets with no date at all.
pub fn sort_encounters(buckets: &mut [ObservationsByEncounter]) {
    buckets.sort_by(compare_newest_first);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncounterDate {
    Parsed(DateTime<Utc>),
    Unreadable,
    Missing,
}

impl EncounterDate {
    fn of(bucket: &ObservationsByEncounter) -> Self {
        match bucket.encounter.as_ref().and_then(|e| e.date.as_deref()) {
            None => EncounterDate::Missing,
            Some(date) => match parse_timestamp(date) {
                Some(parsed) => EncounterDate::Parsed(parsed),
                None => EncounterDate::Unreadable,
            },
        }
    }

    fn rank(self) -> u8 {
        match self {
            EncounterDate::Parsed(_) => 0,
            EncounterDate::Unreadable => 1,
            EncounterDate::Missing => 2,
        }
    }
}

fn compare_newest_first(a: &ObservationsByEncounter, b: &ObservationsByEncounter) -> Ordering {
    match (EncounterDate::of(a), EncounterDate::of(b)) {
        (EncounterDate::Parsed(a), EncounterDate::Parsed(b)) => b.cmp(&a),
        (a, b) => a.rank().cmp(&b.rank()),
    }
}
