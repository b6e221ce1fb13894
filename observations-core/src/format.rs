//! Chuỗi hiển thị cho observation và lượt khám.

use crate::{EncounterMetadata, ExtractedObservation, RangeBound, ReferenceRange, ValueKind};

/// Chuỗi trả về khi lượt khám không có ngày.
pub const DATE_PARSE_ERROR: &str = "Date parse error";

/// Bộ định dạng ngày giờ do ứng dụng bên ngoài cung cấp.
pub trait DateFormatter {
    fn format_date(&self, date: &str) -> String;
}

impl<F> DateFormatter for F
where
    F: Fn(&str) -> String,
{
    fn format_date(&self, date: &str) -> String {
        self(date)
    }
}

/// Hàm dịch chuỗi do ứng dụng bên ngoài cung cấp.
pub trait Translator {
    fn translate(&self, key: &str, default: &str) -> String;
}

impl<F> Translator for F
where
    F: Fn(&str, &str) -> String,
{
    fn translate(&self, key: &str, default: &str) -> String {
        self(key, default)
    }
}

/// `"{value} {unit}"` khi có đơn vị, ngược lại chỉ giá trị.
pub fn format_value(observation: &ExtractedObservation) -> String {
    let Some(value) = &observation.value else {
        return String::new();
    };

    match &value.kind {
        ValueKind::Quantity {
            value,
            unit: Some(unit),
        } => format!("{value} {unit}"),
        ValueKind::Quantity { value, unit: None } => value.to_string(),
        ValueKind::Codeable { value } | ValueKind::String { value } => value.clone(),
        ValueKind::Boolean { value } => value.to_string(),
        ValueKind::Integer { value } => value.to_string(),
    }
}

/// Như [`format_value`] nhưng giá trị boolean được dịch thành Positive/Negative.
pub fn format_display_value(
    observation: &ExtractedObservation,
    translator: &impl Translator,
) -> String {
    match observation.value.as_ref().map(|value| &value.kind) {
        Some(ValueKind::Boolean { value: true }) => translator.translate("positive", "Positive"),
        Some(ValueKind::Boolean { value: false }) => translator.translate("negative", "Negative"),
        _ => format_value(observation),
    }
}

/// Tên observation, kèm khoảng tham chiếu trong ngoặc nếu có.
pub fn format_header(observation: &ExtractedObservation) -> String {
    let Some(value) = &observation.value else {
        return observation.display.clone();
    };
    let Some(range) = &value.reference_range else {
        return observation.display.clone();
    };

    match format_range(range, value.kind.unit()) {
        Some(range_text) => format!("{} ({range_text})", observation.display),
        None => observation.display.clone(),
    }
}

fn format_range(range: &ReferenceRange, fallback_unit: Option<&str>) -> Option<String> {
    match (&range.low, &range.high) {
        (Some(low), Some(high)) => Some(format!(
            "{} - {}",
            format_bound(low, fallback_unit),
            format_bound(high, fallback_unit)
        )),
        (Some(low), None) => Some(format!(">{}", format_bound(low, fallback_unit))),
        (None, Some(high)) => Some(format!("<{}", format_bound(high, fallback_unit))),
        (None, None) => None,
    }
}

fn format_bound(bound: &RangeBound, fallback_unit: Option<&str>) -> String {
    match bound.unit.as_deref().or(fallback_unit) {
        Some(unit) => format!("{} {unit}", bound.value),
        None => bound.value.to_string(),
    }
}

/// Tiêu đề lượt khám; ngày được định dạng bởi `formatter`.
pub fn format_encounter_title(
    encounter: &EncounterMetadata,
    formatter: &impl DateFormatter,
) -> String {
    match encounter.date.as_deref() {
        Some(date) => formatter.format_date(date),
        None => DATE_PARSE_ERROR.to_string(),
    }
}
