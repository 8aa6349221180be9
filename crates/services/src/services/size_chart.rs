//! Turns structured size-chart rows into the `size_data` / `size_chart_data` batch the backend
//! persists.

use models::size::{CreateSizes, NewSize, SizeChartField, WearType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Footwear measurements are emitted under these names.
pub const US_FIELD: &str = "US";
pub const EURO_FIELD: &str = "EURO";
pub const FOOT_LENGTH_FIELD: &str = "To Fit Foot Length";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalField {
    pub label: String,
    pub value: String,
}

impl AdditionalField {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A topwear or bottomwear chart row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasuredEntry {
    pub size: String,
    pub additional_fields: Vec<AdditionalField>,
}

/// A footwear chart row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootwearEntry {
    pub uk_size: String,
    pub us_size: String,
    pub euro_size: String,
    pub actual_size: String,
    /// Collected from the operator but not emitted by [`transform`].
    pub additional_fields: Vec<AdditionalField>,
}

/// Rows of the active chart. The variant is the wear type, so only one table can ever be
/// transformed per submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartEntries {
    Topwear(Vec<MeasuredEntry>),
    Bottomwear(Vec<MeasuredEntry>),
    Footwear(Vec<FootwearEntry>),
}

impl ChartEntries {
    pub fn wear_type(&self) -> WearType {
        match self {
            Self::Topwear(_) => WearType::Topwear,
            Self::Bottomwear(_) => WearType::Bottomwear,
            Self::Footwear(_) => WearType::Footwear,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Topwear(rows) | Self::Bottomwear(rows) => rows.len(),
            Self::Footwear(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of the `custom_size_id` correlating a size row with its chart fields.
pub trait CustomIdSource {
    fn next_id(&mut self) -> String;
}

/// Random v4 UUIDs
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidSource;

impl CustomIdSource for UuidSource {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Build the persistence batch for one size group.
///
/// Validation happens upstream; empty or malformed input is passed through as-is.
pub fn transform(
    entries: &ChartEntries,
    group_name: &str,
    is_cm: bool,
    ids: &mut impl CustomIdSource,
) -> CreateSizes {
    let wear_type = entries.wear_type();
    let mut out = CreateSizes::default();

    match entries {
        ChartEntries::Topwear(rows) | ChartEntries::Bottomwear(rows) => {
            for row in rows {
                let id = ids.next_id();
                out.size_chart_data.extend(
                    row.additional_fields
                        .iter()
                        .map(|field| chart_field(&id, &field.label, &field.value)),
                );
                out.size_data
                    .push(chart_size(group_name, &row.size, wear_type, is_cm, id));
            }
        }
        ChartEntries::Footwear(rows) => {
            for row in rows {
                let id = ids.next_id();
                out.size_chart_data.extend([
                    chart_field(&id, US_FIELD, &row.us_size),
                    chart_field(&id, EURO_FIELD, &row.euro_size),
                    chart_field(&id, FOOT_LENGTH_FIELD, &row.actual_size),
                ]);
                out.size_data
                    .push(chart_size(group_name, &row.uk_size, wear_type, is_cm, id));
            }
        }
    }

    out
}

fn chart_size(
    group_name: &str,
    size: &str,
    wear_type: WearType,
    is_cm: bool,
    custom_size_id: String,
) -> NewSize {
    NewSize {
        name: group_name.to_string(),
        size: size.to_string(),
        wear_type: Some(wear_type),
        has_size_chart: true,
        custom_size_id,
        is_cm: Some(is_cm),
    }
}

fn chart_field(custom_size_id: &str, name: &str, value: &str) -> SizeChartField {
    SizeChartField {
        custom_size_id: custom_size_id.to_string(),
        size_field_name: name.to_string(),
        size_field_value: value.to_string(),
    }
}
