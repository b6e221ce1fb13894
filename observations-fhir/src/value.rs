//! Resolves an observation's `value[x]` into a typed [`ObservationValue`].

use observations_core::{GroupingConfig, ObservationValue, RangeBound, ReferenceRange, ValueKind};

use crate::resources::{RawObservation, RawQuantity};

/// Picks the first present value in the order quantity, codeable concept,
/// string, boolean, integer and attaches the interpretation flag.
pub fn resolve_value(
    observation: &RawObservation,
    config: &GroupingConfig,
) -> Option<ObservationValue> {
    let mut value = resolve_quantity(observation, config)
        .or_else(|| resolve_codeable(observation))
        .or_else(|| resolve_string(observation))
        .or_else(|| resolve_boolean(observation))
        .or_else(|| resolve_integer(observation))?;

    value.is_abnormal = is_abnormal(observation, config);
    Some(value)
}

fn resolve_quantity(
    observation: &RawObservation,
    config: &GroupingConfig,
) -> Option<ObservationValue> {
    let quantity = observation.value_quantity.as_ref()?;
    let magnitude = quantity.value?;

    Some(ObservationValue {
        kind: ValueKind::Quantity {
            value: magnitude,
            unit: quantity.unit.clone(),
        },
        is_abnormal: false,
        reference_range: normal_range(observation, config),
    })
}

fn resolve_codeable(observation: &RawObservation) -> Option<ObservationValue> {
    let text = observation.value_codeable.clone()?;
    Some(ObservationValue::new(ValueKind::Codeable { value: text }))
}

fn resolve_string(observation: &RawObservation) -> Option<ObservationValue> {
    let text = observation.value_string.clone()?;
    Some(ObservationValue::new(ValueKind::String { value: text }))
}

fn resolve_boolean(observation: &RawObservation) -> Option<ObservationValue> {
    let flag = observation.value_boolean?;
    Some(ObservationValue::new(ValueKind::Boolean { value: flag }))
}

fn resolve_integer(observation: &RawObservation) -> Option<ObservationValue> {
    let number = observation.value_integer?;
    Some(ObservationValue::new(ValueKind::Integer { value: number }))
}

/// The first range classified with the "normal" code, if it has a bound.
fn normal_range(observation: &RawObservation, config: &GroupingConfig) -> Option<ReferenceRange> {
    let range = observation.reference_ranges.iter().find(|range| {
        range
            .classification
            .iter()
            .any(|coding| coding.code.as_deref() == Some(config.normal_range_code.as_str()))
    })?;

    let resolved = ReferenceRange {
        low: range.low.as_ref().and_then(to_bound),
        high: range.high.as_ref().and_then(to_bound),
    };

    if resolved.is_empty() {
        None
    } else {
        Some(resolved)
    }
}

fn to_bound(quantity: &RawQuantity) -> Option<RangeBound> {
    Some(RangeBound {
        value: quantity.value?,
        unit: quantity.unit.clone(),
    })
}

fn is_abnormal(observation: &RawObservation, config: &GroupingConfig) -> bool {
    observation.interpretation.iter().any(|coding| {
        coding.system.as_deref() == Some(config.interpretation_system.as_str())
            && coding.code.as_deref() == Some(config.abnormal_code.as_str())
    })
}
