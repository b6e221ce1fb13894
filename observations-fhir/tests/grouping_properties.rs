use std::collections::HashSet;

use observations_core::{GroupingConfig, GroupingError, ValueKind};
use observations_fhir::{group_bundle_value, group_entries};
use serde_json::{json, Value};

fn bundle(resources: Vec<Value>) -> Value {
    let entries: Vec<Value> = resources
        .into_iter()
        .map(|resource| json!({ "resource": resource }))
        .collect();
    json!({ "resourceType": "Bundle", "type": "collection", "entry": entries })
}

fn encounter(id: &str, start: Option<&str>) -> Value {
    let mut resource = json!({
        "resourceType": "Encounter",
        "id": id,
        "type": [{ "text": "Vitals" }]
    });
    if let Some(start) = start {
        resource["period"] = json!({ "start": start });
    }
    resource
}

fn observation(id: &str, encounter: &str, members: &[&str]) -> Value {
    let has_member: Vec<Value> = members
        .iter()
        .map(|member| json!({ "reference": format!("Observation/{member}") }))
        .collect();
    json!({
        "resourceType": "Observation",
        "id": id,
        "code": { "text": id },
        "encounter": { "reference": format!("Encounter/{encounter}") },
        "valueQuantity": { "value": 95, "unit": "mg/dL" },
        "hasMember": has_member
    })
}

fn panel_bundle() -> Value {
    bundle(vec![
        observation("child-b", "enc-1", &[]),
        observation("panel", "enc-1", &["child-a", "child-b"]),
        observation("child-a", "enc-1", &["grandchild"]),
        observation("grandchild", "enc-1", &[]),
        observation("empty-panel", "enc-1", &["does-not-exist"]),
        observation("leaf", "enc-2", &[]),
        encounter("enc-1", Some("2026-01-20T09:00:00Z")),
        encounter("enc-2", Some("2026-01-19T09:00:00Z")),
    ])
}

#[test]
fn running_twice_gives_identical_output() {
    let config = GroupingConfig::default();
    let input = panel_bundle();

    let first = group_bundle_value(&input, &config).unwrap();
    let second = group_bundle_value(&input, &config).unwrap();

    assert_eq!(first, second);
}

#[test]
fn member_ids_never_appear_top_level() {
    let grouped = group_bundle_value(&panel_bundle(), &GroupingConfig::default()).unwrap();

    let top_level: HashSet<&str> = grouped
        .iter()
        .flat_map(|bucket| {
            bucket
                .observations
                .iter()
                .map(|o| o.id.as_str())
                .chain(bucket.grouped_observations.iter().map(|g| g.observation.id.as_str()))
        })
        .collect();

    for child in ["child-a", "child-b", "grandchild"] {
        assert!(!top_level.contains(child), "{child} leaked to top level");
    }
    assert!(top_level.contains("panel"));
    assert!(top_level.contains("empty-panel"));
    assert!(top_level.contains("leaf"));
}

#[test]
fn groups_are_never_empty() {
    let grouped = group_bundle_value(&panel_bundle(), &GroupingConfig::default()).unwrap();

    let groups: Vec<_> = grouped
        .iter()
        .flat_map(|bucket| bucket.grouped_observations.iter())
        .collect();
    assert_eq!(groups.len(), 1);
    assert!(groups.iter().all(|group| !group.children.is_empty()));

    let panel = groups[0];
    let child_a = panel
        .children
        .iter()
        .find(|child| child.id == "child-a")
        .unwrap();
    assert_eq!(child_a.members.len(), 1);
    assert_eq!(child_a.members[0].id, "grandchild");
}

#[test]
fn observation_without_encounter_is_dropped() {
    let input = bundle(vec![
        json!({
            "resourceType": "Observation",
            "id": "no-encounter",
            "code": { "text": "Weight" },
            "valueQuantity": { "value": 70, "unit": "kg" }
        }),
        encounter("enc-unrelated", Some("2026-01-20")),
    ]);

    let grouped = group_bundle_value(&input, &GroupingConfig::default()).unwrap();

    assert!(grouped.is_empty());
}

#[test]
fn encounters_sorted_newest_first_with_missing_dates_last() {
    let input = bundle(vec![
        encounter("enc-20", Some("2026-01-20")),
        encounter("enc-none", None),
        encounter("enc-19", Some("2026-01-19")),
        observation("a", "enc-20", &[]),
        observation("b", "enc-none", &[]),
        observation("c", "enc-19", &[]),
    ]);

    let grouped = group_bundle_value(&input, &GroupingConfig::default()).unwrap();

    let order: Vec<&str> = grouped.iter().map(|b| b.encounter_id.as_str()).collect();
    assert_eq!(order, vec!["enc-20", "enc-19", "enc-none"]);
}

#[test]
fn partial_and_offset_dates_sort_against_full_dates() {
    for newer in [
        "2026-01",
        "2026",
        "2026-01-20T09:00:00.000+0530",
        "2026-01-20T09:00:00",
    ] {
        let input = bundle(vec![
            encounter("older", Some("2025-12-01")),
            encounter("newer", Some(newer)),
            observation("a", "older", &[]),
            observation("b", "newer", &[]),
        ]);

        let grouped = group_bundle_value(&input, &GroupingConfig::default()).unwrap();

        let order: Vec<&str> = grouped.iter().map(|b| b.encounter_id.as_str()).collect();
        assert_eq!(order, vec!["newer", "older"], "start {newer}");
    }
}

#[test]
fn unreadable_start_sorts_before_missing_start() {
    let input = bundle(vec![
        encounter("enc-none", None),
        encounter("enc-garbled", Some("sometime in winter")),
        encounter("enc-dated", Some("2025-01-01")),
        observation("a", "enc-none", &[]),
        observation("b", "enc-garbled", &[]),
        observation("c", "enc-dated", &[]),
    ]);

    let grouped = group_bundle_value(&input, &GroupingConfig::default()).unwrap();

    let order: Vec<&str> = grouped.iter().map(|b| b.encounter_id.as_str()).collect();
    assert_eq!(order, vec!["enc-dated", "enc-garbled", "enc-none"]);
}

#[test]
fn abnormal_flag_follows_interpretation_only() {
    let mut flagged = observation("flagged", "enc-1", &[]);
    flagged["interpretation"] = json!([{ "coding": [{
        "system": "http://terminology.hl7.org/CodeSystem/v3-ObservationInterpretation",
        "code": "A"
    }] }]);

    let input = bundle(vec![
        observation("plain", "enc-1", &[]),
        flagged,
        encounter("enc-1", Some("2026-01-20")),
    ]);

    let grouped = group_bundle_value(&input, &GroupingConfig::default()).unwrap();
    let observations = &grouped[0].observations;

    let plain = observations[0].value.as_ref().unwrap();
    let flagged = observations[1].value.as_ref().unwrap();
    assert_eq!(plain.kind, flagged.kind);
    assert!(!plain.is_abnormal);
    assert!(flagged.is_abnormal);
    assert_eq!(
        flagged.kind,
        ValueKind::Quantity {
            value: 95.0,
            unit: Some("mg/dL".to_string())
        }
    );
}

#[test]
fn custom_config_changes_abnormal_code() {
    let mut high = observation("high", "enc-1", &[]);
    high["interpretation"] = json!([{ "coding": [{
        "system": "http://terminology.hl7.org/CodeSystem/v3-ObservationInterpretation",
        "code": "H"
    }] }]);
    let input = bundle(vec![high, encounter("enc-1", Some("2026-01-20"))]);

    let default = group_bundle_value(&input, &GroupingConfig::default()).unwrap();
    assert!(!default[0].observations[0].value.as_ref().unwrap().is_abnormal);

    let config = GroupingConfig {
        abnormal_code: "H".to_string(),
        ..GroupingConfig::default()
    };
    let custom = group_bundle_value(&input, &config).unwrap();
    assert!(custom[0].observations[0].value.as_ref().unwrap().is_abnormal);
}

#[test]
fn bare_entry_arrays_are_accepted() {
    let entries = vec![
        json!({ "resource": observation("a", "enc-1", &[]) }),
        json!({ "resource": encounter("enc-1", Some("2026-01-20")) }),
    ];

    let from_array = group_bundle_value(&Value::Array(entries.clone()), &GroupingConfig::default())
        .unwrap();
    let from_slice = group_entries(&entries, &GroupingConfig::default());

    assert_eq!(from_array, from_slice);
    assert_eq!(from_array.len(), 1);
}

#[test]
fn bundle_without_entries_is_empty() {
    let grouped =
        group_bundle_value(&json!({ "resourceType": "Bundle" }), &GroupingConfig::default())
            .unwrap();
    assert!(grouped.is_empty());
}

#[test]
fn non_bundle_input_is_rejected() {
    let patient = json!({ "resourceType": "Patient", "id": "pat-1" });
    let err = group_bundle_value(&patient, &GroupingConfig::default()).unwrap_err();
    assert!(matches!(err, GroupingError::UnexpectedResource(_)));

    let err = group_bundle_value(&json!("text"), &GroupingConfig::default()).unwrap_err();
    assert!(matches!(err, GroupingError::Parse(_)));

    let err = observations_fhir::group_bundle_str("{ not json", &GroupingConfig::default())
        .unwrap_err();
    assert!(matches!(err, GroupingError::Parse(_)));
}
