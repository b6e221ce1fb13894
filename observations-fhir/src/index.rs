use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::resources::{RawEncounter, RawObservation};

/// Lookup tables built from a bundle before any observation is resolved.
#[derive(Debug, Default, Clone)]
pub struct BundleIndex {
    encounters: HashMap<String, RawEncounter>,
    observations: HashMap<String, RawObservation>,
    observation_order: Vec<String>,
    child_ids: HashSet<String>,
}

impl BundleIndex {
    /// Indexes bundle entries (`{ "resource": {...} }`).
    pub fn build(entries: &[Value]) -> Self {
        let mut index = Self::default();

        for entry in entries {
            let Some(resource) = entry.get("resource") else {
                tracing::trace!("skipping bundle entry without resource");
                continue;
            };

            match resource
                .get("resourceType")
                .and_then(Value::as_str)
                .unwrap_or_default()
            {
                "Observation" => match RawObservation::from_resource(resource) {
                    Some(observation) => index.insert_observation(observation),
                    None => tracing::trace!("skipping Observation without id"),
                },
                "Encounter" => match RawEncounter::from_resource(resource) {
                    Some(encounter) => {
                        index.encounters.insert(encounter.id.clone(), encounter);
                    }
                    None => tracing::trace!("skipping Encounter without id"),
                },
                _ => {}
            }
        }

        index.child_ids = index
            .observations
            .values()
            .flat_map(|observation| observation.member_refs.iter().cloned())
            .collect();

        tracing::debug!(
            observations = index.observations.len(),
            encounters = index.encounters.len(),
            children = index.child_ids.len(),
            "indexed bundle"
        );

        index
    }

    fn insert_observation(&mut self, observation: RawObservation) {
        let id = observation.id.clone();
        if self.observations.insert(id.clone(), observation).is_none() {
            self.observation_order.push(id);
        }
    }

    pub fn observation(&self, id: &str) -> Option<&RawObservation> {
        self.observations.get(id)
    }

    pub fn encounter(&self, id: &str) -> Option<&RawEncounter> {
        self.encounters.get(id)
    }

    /// Observation ids in first-seen bundle order.
    pub fn observation_ids(&self) -> impl Iterator<Item = &str> {
        self.observation_order.iter().map(String::as_str)
    }

    /// Whether some observation lists `id` in its `hasMember`.
    pub fn is_child(&self, id: &str) -> bool {
        self.child_ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partitions_resources_and_collects_child_ids() {
        let entries = vec![
            json!({ "resource": {
                "resourceType": "Observation",
                "id": "panel",
                "hasMember": [
                    { "reference": "Observation/systolic" },
                    { "reference": "Observation/diastolic" }
                ]
            }}),
            json!({ "resource": { "resourceType": "Observation", "id": "systolic" } }),
            json!({ "resource": { "resourceType": "Encounter", "id": "enc-1" } }),
            json!({ "resource": { "resourceType": "Patient", "id": "pat-1" } }),
            json!({ "fullUrl": "urn:uuid:missing-resource" }),
            json!({ "resource": { "resourceType": "Observation" } }),
        ];

        let index = BundleIndex::build(&entries);

        assert_eq!(index.observations.len(), 2);
        assert_eq!(index.encounters.len(), 1);
        assert!(index.is_child("systolic"));
        assert!(index.is_child("diastolic"));
        assert!(!index.is_child("panel"));
        assert_eq!(
            index.observation_ids().collect::<Vec<_>>(),
            vec!["panel", "systolic"]
        );
    }

    #[test]
    fn duplicate_ids_keep_first_position() {
        let entries = vec![
            json!({ "resource": {
                "resourceType": "Observation", "id": "a", "valueString": "old"
            }}),
            json!({ "resource": { "resourceType": "Observation", "id": "b" } }),
            json!({ "resource": {
                "resourceType": "Observation", "id": "a", "valueString": "new"
            }}),
        ];

        let index = BundleIndex::build(&entries);

        assert_eq!(index.observation_ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            index.observation("a").and_then(|o| o.value_string.as_deref()),
            Some("new")
        );
    }
}
