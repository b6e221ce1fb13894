//! Mô hình dữ liệu đầu ra cho việc nhóm observation theo lượt khám (encounter).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod format;

pub use format::{
    format_display_value, format_encounter_title, format_header, format_value, DateFormatter,
    Translator, DATE_PARSE_ERROR,
};

/// Hệ mã diễn giải (interpretation) chuẩn HL7.
pub const INTERPRETATION_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/v3-ObservationInterpretation";

/// Cấu hình các mã cố định dùng khi phân giải giá trị.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupingConfig {
    /// Hệ mã của interpretation được coi là bất thường.
    pub interpretation_system: String,
    /// Mã interpretation "bất thường".
    pub abnormal_code: String,
    /// Mã phân loại khoảng tham chiếu "bình thường".
    pub normal_range_code: String,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            interpretation_system: INTERPRETATION_SYSTEM.to_string(),
            abnormal_code: "A".to_string(),
            normal_range_code: "normal".to_string(),
        }
    }
}

/// Giá trị lâm sàng đã phân giải, phân biệt theo trường `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ValueKind {
    Quantity {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    Codeable {
        value: String,
    },
    String {
        value: String,
    },
    Boolean {
        value: bool,
    },
    Integer {
        value: i64,
    },
}

impl ValueKind {
    /// Đơn vị đo, chỉ có với giá trị dạng quantity.
    pub fn unit(&self) -> Option<&str> {
        match self {
            ValueKind::Quantity { unit, .. } => unit.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservationValue {
    #[serde(flatten)]
    pub kind: ValueKind,
    #[serde(default)]
    pub is_abnormal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<ReferenceRange>,
}

impl ObservationValue {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            is_abnormal: false,
            reference_range: None,
        }
    }
}

/// Khoảng tham chiếu "bình thường" của một giá trị quantity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReferenceRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<RangeBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<RangeBound>,
}

impl ReferenceRange {
    pub fn is_empty(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RangeBound {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Thông tin lượt khám gắn với observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncounterMetadata {
    pub id: String,
    #[serde(rename = "type")]
    pub encounter_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl EncounterMetadata {
    /// Thời điểm bắt đầu lượt khám; `None` khi thiếu hoặc không đọc được.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.date.as_deref().and_then(parse_timestamp)
    }
}

/// Đọc thời điểm FHIR: RFC 3339, offset dạng `+hhmm`, datetime không múi giờ
/// (coi là UTC), hoặc ngày rút gọn `YYYY-MM-DD`, `YYYY-MM`, `YYYY` (thời điểm
/// đầu tiên của khoảng đó).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    parse_partial_date(value)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_partial_date(value: &str) -> Option<NaiveDate> {
    match value.len() {
        10 => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
        7 => NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").ok(),
        4 if value.bytes().all(|b| b.is_ascii_digit()) => {
            NaiveDate::from_ymd_opt(value.parse().ok()?, 1, 1)
        }
        _ => None,
    }
}

/// Observation đã phân giải đầy đủ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedObservation {
    pub id: String,
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ObservationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encounter: Option<EncounterMetadata>,
    /// Các observation con đã phân giải (hasMember).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ExtractedObservation>,
}

/// Observation cha (panel) cùng danh sách con không rỗng.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupedObservation {
    #[serde(flatten)]
    pub observation: ExtractedObservation,
    pub children: Vec<ExtractedObservation>,
}

/// Observation cấp cao nhất: đứng riêng hoặc là nhóm cha.
#[derive(Debug, Clone, PartialEq)]
pub enum TopLevelObservation {
    Standalone(ExtractedObservation),
    Grouped(GroupedObservation),
}

impl From<ExtractedObservation> for TopLevelObservation {
    /// Chuyển `members` thành `children`; không có con thì giữ nguyên là observation đơn.
    fn from(mut observation: ExtractedObservation) -> Self {
        if observation.members.is_empty() {
            return TopLevelObservation::Standalone(observation);
        }
        let children = std::mem::take(&mut observation.members);
        TopLevelObservation::Grouped(GroupedObservation {
            observation,
            children,
        })
    }
}

/// Một nhóm kết quả theo lượt khám.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservationsByEncounter {
    pub encounter_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encounter: Option<EncounterMetadata>,
    pub observations: Vec<ExtractedObservation>,
    pub grouped_observations: Vec<GroupedObservation>,
}

impl ObservationsByEncounter {
    pub fn new(encounter_id: impl Into<String>) -> Self {
        Self {
            encounter_id: encounter_id.into(),
            encounter: None,
            observations: Vec::new(),
            grouped_observations: Vec::new(),
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.encounter.as_ref().and_then(EncounterMetadata::started_at)
    }
}

/// Thống kê một lần chạy nhóm dữ liệu.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupingSummary {
    pub encounters: usize,
    pub standalone: usize,
    pub groups: usize,
    /// Số observation bị bỏ vì không gắn được lượt khám.
    pub dropped: usize,
}

/// Lỗi khi đọc dữ liệu đầu vào.
#[derive(Debug, thiserror::Error)]
pub enum GroupingError {
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
    #[error("Resource không được hỗ trợ: {0}")]
    UnexpectedResource(String),
}
