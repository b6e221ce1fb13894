//! Raw FHIR records, read leniently from `serde_json::Value`.
//!
//! Only the fields the grouping pipeline consumes are kept. Missing or
//! malformed fields become `None`/empty instead of failing the resource.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct RawCoding {
    pub system: Option<String>,
    pub code: Option<String>,
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawQuantity {
    pub value: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawReferenceRange {
    pub low: Option<RawQuantity>,
    pub high: Option<RawQuantity>,
    /// Codings of the range's `type` (its classification).
    pub classification: Vec<RawCoding>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub id: String,
    pub code_text: Option<String>,
    pub code_display: Option<String>,
    pub value_quantity: Option<RawQuantity>,
    pub value_codeable: Option<String>,
    pub value_string: Option<String>,
    pub value_boolean: Option<bool>,
    pub value_integer: Option<i64>,
    pub reference_ranges: Vec<RawReferenceRange>,
    pub interpretation: Vec<RawCoding>,
    pub encounter_ref: Option<String>,
    pub member_refs: Vec<String>,
}

impl RawObservation {
    /// Reads an `Observation` resource. Returns `None` without an `id`.
    pub fn from_resource(resource: &Value) -> Option<Self> {
        let id = resource_id(resource)?;
        let code = resource.get("code");

        Some(Self {
            id,
            code_text: code.and_then(|code| non_empty_str(code.get("text"))),
            code_display: code
                .and_then(|code| code.get("coding"))
                .and_then(Value::as_array)
                .and_then(|arr| arr.first())
                .and_then(|coding| non_empty_str(coding.get("display"))),
            value_quantity: resource.get("valueQuantity").map(parse_quantity),
            value_codeable: resource
                .get("valueCodeableConcept")
                .and_then(extract_codeable_text),
            value_string: non_empty_str(resource.get("valueString")),
            value_boolean: resource.get("valueBoolean").and_then(Value::as_bool),
            value_integer: resource.get("valueInteger").and_then(Value::as_i64),
            reference_ranges: resource
                .get("referenceRange")
                .and_then(Value::as_array)
                .map(|ranges| ranges.iter().map(parse_reference_range).collect())
                .unwrap_or_default(),
            interpretation: resource
                .get("interpretation")
                .and_then(Value::as_array)
                .map(|concepts| concepts.iter().flat_map(parse_codings).collect())
                .unwrap_or_default(),
            encounter_ref: resource
                .get("encounter")
                .and_then(|reference| non_empty_str(reference.get("reference")))
                .and_then(|reference| reference_id(&reference)),
            member_refs: resource
                .get("hasMember")
                .and_then(Value::as_array)
                .map(|members| {
                    members
                        .iter()
                        .filter_map(|member| non_empty_str(member.get("reference")))
                        .filter_map(|reference| reference_id(&reference))
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawEncounter {
    pub id: String,
    pub type_text: Option<String>,
    pub start: Option<String>,
    pub provider: Option<String>,
    pub location: Option<String>,
}

impl RawEncounter {
    /// Reads an `Encounter` resource. Returns `None` without an `id`.
    pub fn from_resource(resource: &Value) -> Option<Self> {
        let id = resource_id(resource)?;

        Some(Self {
            id,
            type_text: resource
                .get("type")
                .and_then(Value::as_array)
                .and_then(|arr| arr.first())
                .and_then(extract_codeable_text),
            start: resource
                .get("period")
                .and_then(|period| non_empty_str(period.get("start"))),
            provider: resource
                .get("participant")
                .and_then(Value::as_array)
                .and_then(|arr| arr.first())
                .and_then(|participant| participant.get("individual"))
                .and_then(|individual| non_empty_str(individual.get("display"))),
            location: resource
                .get("location")
                .and_then(Value::as_array)
                .and_then(|arr| {
                    arr.iter().find_map(|entry| {
                        entry
                            .get("location")
                            .and_then(|location| non_empty_str(location.get("display")))
                    })
                }),
        })
    }
}

/// Extracts the logical id from a FHIR reference.
///
/// Handles `Type/id`, `Type/id/_history/n`, absolute URLs and `urn:uuid:` forms.
pub fn reference_id(reference: &str) -> Option<String> {
    let reference = reference.trim();
    if let Some(uuid) = reference.strip_prefix("urn:uuid:") {
        return (!uuid.is_empty()).then(|| uuid.to_string());
    }

    let path = match reference.find("/_history/") {
        Some(index) => &reference[..index],
        None => reference,
    };

    path.rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// `text`, then the first coding `display`, then the first coding `code`.
pub fn extract_codeable_text(value: &Value) -> Option<String> {
    if let Some(text) = non_empty_str(value.get("text")) {
        return Some(text);
    }

    let codings = value.get("coding").and_then(Value::as_array)?;
    for coding in codings {
        if let Some(display) = non_empty_str(coding.get("display")) {
            return Some(display);
        }
        if let Some(code) = non_empty_str(coding.get("code")) {
            return Some(code);
        }
    }

    None
}

fn resource_id(resource: &Value) -> Option<String> {
    non_empty_str(resource.get("id"))
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    let text = value?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn parse_quantity(value: &Value) -> RawQuantity {
    RawQuantity {
        value: value.get("value").and_then(Value::as_f64),
        unit: non_empty_str(value.get("unit")).or_else(|| non_empty_str(value.get("code"))),
    }
}

fn parse_reference_range(value: &Value) -> RawReferenceRange {
    RawReferenceRange {
        low: value.get("low").map(parse_quantity),
        high: value.get("high").map(parse_quantity),
        classification: value.get("type").map(parse_codings).unwrap_or_default(),
    }
}

fn parse_codings(concept: &Value) -> Vec<RawCoding> {
    concept
        .get("coding")
        .and_then(Value::as_array)
        .map(|codings| {
            codings
                .iter()
                .map(|coding| RawCoding {
                    system: non_empty_str(coding.get("system")),
                    code: non_empty_str(coding.get("code")),
                    display: non_empty_str(coding.get("display")),
                })
                .collect()
        })
        .unwrap_or_default()
}
