//! FHIR JSON to per-encounter observation groups.
//!
//! The bundle is indexed first, then every observation is resolved against the
//! index, so entry order never affects the result.

use observations_core::{GroupingConfig, GroupingError, GroupingSummary, ObservationsByEncounter};
use serde_json::Value;

mod encounter;
mod extract;
mod index;
pub mod resources;
mod value;

pub use encounter::{group_by_encounter, sort_encounters};
pub use extract::{extract_observation, partition_observations, Partition};
pub use index::BundleIndex;
pub use value::resolve_value;

/// Group observations from a JSON string.
pub fn group_bundle_str(
    bundle_json: &str,
    config: &GroupingConfig,
) -> Result<Vec<ObservationsByEncounter>, GroupingError> {
    let value: Value =
        serde_json::from_str(bundle_json).map_err(|err| GroupingError::Parse(err.to_string()))?;
    group_bundle_value(&value, config)
}

/// Group observations from a `serde_json::Value`.
///
/// Accepts a `Bundle` resource or a bare array of bundle entries.
pub fn group_bundle_value(
    bundle: &Value,
    config: &GroupingConfig,
) -> Result<Vec<ObservationsByEncounter>, GroupingError> {
    group_bundle_with_summary(bundle, config).map(|(buckets, _)| buckets)
}

/// Like [`group_bundle_value`], also returning counts for the run.
pub fn group_bundle_with_summary(
    bundle: &Value,
    config: &GroupingConfig,
) -> Result<(Vec<ObservationsByEncounter>, GroupingSummary), GroupingError> {
    let entries = bundle_entries(bundle)?;
    Ok(group_entries_with_summary(entries, config))
}

/// Group observations from already-extracted bundle entries.
pub fn group_entries(entries: &[Value], config: &GroupingConfig) -> Vec<ObservationsByEncounter> {
    group_entries_with_summary(entries, config).0
}

fn group_entries_with_summary(
    entries: &[Value],
    config: &GroupingConfig,
) -> (Vec<ObservationsByEncounter>, GroupingSummary) {
    let index = BundleIndex::build(entries);
    let partition = partition_observations(&index, config);

    let mut summary = GroupingSummary {
        standalone: partition.standalone.len(),
        groups: partition.grouped.len(),
        ..GroupingSummary::default()
    };

    let (mut buckets, dropped) = group_by_encounter(partition);
    sort_encounters(&mut buckets);

    summary.encounters = buckets.len();
    summary.dropped = dropped;

    (buckets, summary)
}

fn bundle_entries(bundle: &Value) -> Result<&[Value], GroupingError> {
    match bundle {
        Value::Array(entries) => Ok(entries),
        Value::Object(_) => {
            let resource_type = bundle
                .get("resourceType")
                .and_then(Value::as_str)
                .unwrap_or("Bundle");
            if resource_type != "Bundle" {
                return Err(GroupingError::UnexpectedResource(format!(
                    "Expected resourceType Bundle, received {resource_type}"
                )));
            }

            Ok(bundle
                .get("entry")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default())
        }
        _ => Err(GroupingError::Parse(
            "Expected a Bundle object or an array of entries".to_string(),
        )),
    }
}
