//! Bridge WASM <-> JavaScript trung lập framework.

use observations_core::{EncounterMetadata, ExtractedObservation, GroupingConfig, GroupingError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsGroupingConfig {
    #[serde(default)]
    interpretation_system: Option<String>,
    #[serde(default)]
    abnormal_code: Option<String>,
    #[serde(default)]
    normal_range_code: Option<String>,
}

impl From<JsGroupingConfig> for GroupingConfig {
    fn from(cfg: JsGroupingConfig) -> Self {
        let mut base = GroupingConfig::default();
        if let Some(system) = cfg.interpretation_system {
            base.interpretation_system = system;
        }
        if let Some(code) = cfg.abnormal_code {
            base.abnormal_code = code;
        }
        if let Some(code) = cfg.normal_range_code {
            base.normal_range_code = code;
        }
        base
    }
}

/// Nhóm observation trong bundle FHIR theo lượt khám.
#[wasm_bindgen(js_name = groupObservations)]
pub fn group_observations(
    input_bundle: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let bundle_value = from_value::<serde_json::Value>(input_bundle)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được JSON bundle: {err}")))?;

    let cfg = match config {
        Some(js_cfg) => {
            let cfg: JsGroupingConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            GroupingConfig::from(cfg)
        }
        None => GroupingConfig::default(),
    };

    let grouped = observations_fhir::group_bundle_value(&bundle_value, &cfg)
        .map_err(|err| JsValue::from_str(&format_grouping_error(err)))?;

    to_js(&grouped)
}

/// Tiêu đề cột cho một observation (tên + khoảng tham chiếu).
#[wasm_bindgen(js_name = formatHeader)]
pub fn format_header(observation: JsValue) -> Result<String, JsValue> {
    let observation: ExtractedObservation = from_js(observation, "observation")?;
    Ok(observations_core::format_header(&observation))
}

/// Giá trị hiển thị của một observation.
#[wasm_bindgen(js_name = formatValue)]
pub fn format_value(observation: JsValue) -> Result<String, JsValue> {
    let observation: ExtractedObservation = from_js(observation, "observation")?;
    Ok(observations_core::format_value(&observation))
}

/// Tiêu đề lượt khám; `date_formatter` là hàm JS `(date) => string`.
#[wasm_bindgen(js_name = formatEncounterTitle)]
pub fn format_encounter_title(
    encounter: JsValue,
    date_formatter: &js_sys::Function,
) -> Result<String, JsValue> {
    let encounter: EncounterMetadata = from_js(encounter, "encounter")?;

    encounter_title(&encounter, |date| call_date_formatter(date_formatter, date))
}

/// Chạy `format_date` trước để lỗi từ hàm JS được trả về thay vì bị nuốt.
fn encounter_title<E>(
    encounter: &EncounterMetadata,
    format_date: impl FnOnce(&str) -> Result<String, E>,
) -> Result<String, E> {
    let formatted = encounter.date.as_deref().map(format_date).transpose()?;
    let formatter = |_: &str| formatted.clone().unwrap_or_default();
    Ok(observations_core::format_encounter_title(encounter, &formatter))
}

fn call_date_formatter(date_formatter: &js_sys::Function, date: &str) -> Result<String, JsValue> {
    date_formatter
        .call1(&JsValue::NULL, &JsValue::from_str(date))?
        .as_string()
        .ok_or_else(|| JsValue::from_str("dateFormatter phải trả về chuỗi"))
}

fn from_js<T: DeserializeOwned>(value: JsValue, what: &str) -> Result<T, JsValue> {
    let json = from_value::<serde_json::Value>(value)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được {what}: {err}")))?;
    serde_json::from_value(json)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được {what}: {err}")))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Không serialize kết quả: {err}")))
}

fn format_grouping_error(err: GroupingError) -> String {
    format!("Grouping error: {err}")
}
