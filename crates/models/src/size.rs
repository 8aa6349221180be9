use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

/// Backend identifier of a persisted size row
pub type SizeId = i64;

/// Template a structured size chart is built from
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WearType {
    Topwear,
    Bottomwear,
    Footwear,
}

impl WearType {
    /// Labels an additional field may not use, compared lowercase.
    pub fn reserved_labels(self) -> &'static [&'static str] {
        match self {
            Self::Topwear | Self::Bottomwear => &["size"],
            Self::Footwear => &["uk size", "us size", "euro size", "to fit foot length"],
        }
    }

    /// Measurement columns a freshly selected chart starts with
    pub fn template_fields(self) -> &'static [&'static str] {
        match self {
            Self::Topwear => &["Front Length", "Across Shoulder"],
            Self::Bottomwear => &[
                "To Fit Waist",
                "Inseam Length",
                "Thigh",
                "Rise",
                "Outseam Length",
                "Hips",
            ],
            Self::Footwear => &[],
        }
    }
}

/// Unit shared by every entry of a size group. Values are stored as typed, never converted.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SizeUnit {
    #[default]
    Cm,
    Inch,
}

impl SizeUnit {
    pub fn is_cm(self) -> bool {
        matches!(self, Self::Cm)
    }
}

/// One `size_data` row of a create-sizes batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct NewSize {
    pub name: String,
    pub size: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    #[ts(optional)]
    pub wear_type: Option<WearType>,
    pub has_size_chart: bool,
    pub custom_size_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[ts(optional)]
    pub is_cm: Option<bool>,
}

impl NewSize {
    /// Row for a group without a size chart
    pub fn flat(name: impl Into<String>, size: impl Into<String>, custom_size_id: String) -> Self {
        Self {
            name: name.into(),
            size: size.into(),
            wear_type: None,
            has_size_chart: false,
            custom_size_id,
            is_cm: None,
        }
    }
}

/// One measurement of a size chart, linked to its size row by `custom_size_id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct SizeChartField {
    pub custom_size_id: String,
    pub size_field_name: String,
    pub size_field_value: String,
}

/// Body of `POST /size`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
pub struct CreateSizes {
    pub size_data: Vec<NewSize>,
    pub size_chart_data: Vec<SizeChartField>,
}

/// A size row as listed by `GET /size`. Rows of one group share `name`, `type` and
/// `has_size_chart`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct Size {
    pub id: SizeId,
    pub name: String,
    pub size: String,
    #[serde(rename = "type", default)]
    pub wear_type: Option<WearType>,
    #[serde(default)]
    pub has_size_chart: bool,
    #[serde(default)]
    pub custom_size_id: Option<String>,
    #[serde(default)]
    pub is_cm: Option<bool>,
}

/// Response of `GET /size/check`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct NameUsage {
    pub total: u64,
}

impl NameUsage {
    pub fn is_taken(&self) -> bool {
        self.total > 0
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn flat_row_omits_chart_only_fields() {
        let row = NewSize::flat("Tees", "M", "abc".to_string());
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "Tees",
                "size": "M",
                "has_size_chart": false,
                "custom_size_id": "abc"
            })
        );
    }

    #[test]
    fn wear_type_round_trips_lowercase() {
        assert_eq!(WearType::from_str("footwear").unwrap(), WearType::Footwear);
        assert_eq!(WearType::Bottomwear.to_string(), "bottomwear");
        assert_eq!(
            serde_json::to_string(&WearType::Topwear).unwrap(),
            "\"topwear\""
        );
    }

    #[test]
    fn listed_size_tolerates_missing_optional_columns() {
        let row: Size = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "Letters",
            "size": "XL"
        }))
        .unwrap();
        assert_eq!(row.wear_type, None);
        assert!(!row.has_size_chart);
        assert_eq!(row.custom_size_id, None);
    }
}
