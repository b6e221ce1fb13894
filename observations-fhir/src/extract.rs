use std::collections::HashSet;

use observations_core::{
    EncounterMetadata, ExtractedObservation, GroupedObservation, GroupingConfig,
    TopLevelObservation,
};

use crate::index::BundleIndex;
use crate::resources::RawEncounter;
use crate::value::resolve_value;

/// Top-level observations split by whether they resolved any members.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Partition {
    pub standalone: Vec<ExtractedObservation>,
    pub grouped: Vec<GroupedObservation>,
}

/// Resolves observation `id` and, recursively, its members.
///
/// Ids already in `visited` are not extracted again, which cuts `hasMember`
/// cycles and keeps a member under a single parent.
pub fn extract_observation(
    id: &str,
    index: &BundleIndex,
    config: &GroupingConfig,
    visited: &mut HashSet<String>,
) -> Option<ExtractedObservation> {
    let raw = index.observation(id)?;
    if !visited.insert(id.to_string()) {
        tracing::warn!(observation = id, "observation already resolved, skipping member");
        return None;
    }

    let display = raw
        .code_text
        .clone()
        .or_else(|| raw.code_display.clone())
        .unwrap_or_default();

    let encounter = raw
        .encounter_ref
        .as_deref()
        .and_then(|encounter_id| index.encounter(encounter_id))
        .map(encounter_metadata);

    let members = raw
        .member_refs
        .iter()
        .filter_map(|member_id| extract_observation(member_id, index, config, visited))
        .collect();

    Some(ExtractedObservation {
        id: raw.id.clone(),
        display,
        value: resolve_value(raw, config),
        encounter,
        members,
    })
}

/// Extracts every observation that is not some other observation's member.
pub fn partition_observations(index: &BundleIndex, config: &GroupingConfig) -> Partition {
    let mut partition = Partition::default();
    let mut visited = HashSet::new();

    for id in index.observation_ids() {
        if index.is_child(id) {
            continue;
        }
        let Some(observation) = extract_observation(id, index, config, &mut visited) else {
            continue;
        };

        match TopLevelObservation::from(observation) {
            TopLevelObservation::Grouped(group) => partition.grouped.push(group),
            TopLevelObservation::Standalone(standalone) => partition.standalone.push(standalone),
        }
    }

    tracing::debug!(
        standalone = partition.standalone.len(),
        grouped = partition.grouped.len(),
        "partitioned observations"
    );

    partition
}

fn encounter_metadata(encounter: &RawEncounter) -> EncounterMetadata {
    EncounterMetadata {
        id: encounter.id.clone(),
        encounter_type: encounter.type_text.clone().unwrap_or_default(),
        date: encounter.start.clone(),
        provider: encounter.provider.clone(),
        location: encounter.location.clone(),
    }
}
