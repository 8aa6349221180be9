//! Form state for defining a size group: a flat list of labels, or a structured chart for one
//! wear type. Validation runs before anything is sent.

use std::{collections::HashMap, fmt, sync::Arc};

use models::size::{CreateSizes, NewSize, SizeUnit, WearType};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    admin_api::{ApiError, SizeApi},
    name_check::NameCheck,
    size_catalog::SizeGroupSummary,
    size_chart::{
        AdditionalField, ChartEntries, CustomIdSource, FootwearEntry, MeasuredEntry, UuidSource,
        transform,
    },
};

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 40;

pub type ColumnId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxonomyError {
    #[error("row {0} does not exist")]
    RowOutOfRange(usize),
    #[error("column {0} does not exist")]
    UnknownColumn(ColumnId),
    #[error("size chart is not enabled")]
    ChartDisabled,
    #[error("group {0:?} has a size chart and cannot be edited")]
    ChartNotEditable(String),
}

/// Where the builder currently is. `ChartPending` means the chart is enabled but no wear type
/// has been picked yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomyMode {
    Flat,
    ChartPending,
    Chart(WearType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: ColumnId,
    pub label: String,
}

/// The four size systems of a footwear row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FootwearSizes {
    pub uk_size: String,
    pub us_size: String,
    pub euro_size: String,
    pub actual_size: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRow<S> {
    pub sizes: S,
    values: HashMap<ColumnId, String>,
}

impl<S> ChartRow<S> {
    pub fn value(&self, column: ColumnId) -> &str {
        self.values.get(&column).map(String::as_str).unwrap_or("")
    }
}

/// One wear type's chart. The column schema is owned by the table, so every row always has
/// exactly the same fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartTable<S> {
    columns: Vec<Column>,
    rows: Vec<ChartRow<S>>,
    next_column: ColumnId,
}

impl<S: Default> ChartTable<S> {
    /// One blank row under the given columns
    pub fn template(labels: &[&str]) -> Self {
        let mut table = Self {
            columns: Vec::new(),
            rows: Vec::new(),
            next_column: 0,
        };
        for label in labels {
            table.add_column(*label);
        }
        table.add_row();
        table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[ChartRow<S>] {
        &self.rows
    }

    pub fn add_column(&mut self, label: impl Into<String>) -> ColumnId {
        let id = self.next_column;
        self.next_column += 1;
        self.columns.push(Column {
            id,
            label: label.into(),
        });
        for row in &mut self.rows {
            row.values.insert(id, String::new());
        }
        id
    }

    pub fn remove_column(&mut self, column: ColumnId) -> Result<(), TaxonomyError> {
        let idx = self.column_index(column)?;
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.values.remove(&column);
        }
        Ok(())
    }

    pub fn rename_column(
        &mut self,
        column: ColumnId,
        label: impl Into<String>,
    ) -> Result<(), TaxonomyError> {
        let idx = self.column_index(column)?;
        self.columns[idx].label = label.into();
        Ok(())
    }

    /// Append a blank row and return its index
    pub fn add_row(&mut self) -> usize {
        let values = self
            .columns
            .iter()
            .map(|c| (c.id, String::new()))
            .collect();
        self.rows.push(ChartRow {
            sizes: S::default(),
            values,
        });
        self.rows.len() - 1
    }

    /// The last remaining row cannot be removed.
    pub fn remove_row(&mut self, row: usize) -> Result<bool, TaxonomyError> {
        if row >= self.rows.len() {
            return Err(TaxonomyError::RowOutOfRange(row));
        }
        if self.rows.len() == 1 {
            return Ok(false);
        }
        self.rows.remove(row);
        Ok(true)
    }

    pub fn sizes_mut(&mut self, row: usize) -> Result<&mut S, TaxonomyError> {
        self.rows
            .get_mut(row)
            .map(|r| &mut r.sizes)
            .ok_or(TaxonomyError::RowOutOfRange(row))
    }

    pub fn set_value(
        &mut self,
        row: usize,
        column: ColumnId,
        value: impl Into<String>,
    ) -> Result<(), TaxonomyError> {
        self.column_index(column)?;
        let target = self
            .rows
            .get_mut(row)
            .ok_or(TaxonomyError::RowOutOfRange(row))?;
        target.values.insert(column, value.into());
        Ok(())
    }

    /// Column id for a label, compared case-insensitively
    pub fn column_by_label(&self, label: &str) -> Option<ColumnId> {
        let wanted = normalize_label(label);
        self.columns
            .iter()
            .find(|c| normalize_label(&c.label) == wanted)
            .map(|c| c.id)
    }

    fn column_index(&self, column: ColumnId) -> Result<usize, TaxonomyError> {
        self.columns
            .iter()
            .position(|c| c.id == column)
            .ok_or(TaxonomyError::UnknownColumn(column))
    }

    fn additional_fields(&self, row: &ChartRow<S>) -> Vec<AdditionalField> {
        self.columns
            .iter()
            .map(|c| AdditionalField::new(c.label.trim(), row.value(c.id).trim()))
            .collect()
    }
}

impl ChartTable<String> {
    fn entries(&self) -> Vec<MeasuredEntry> {
        self.rows
            .iter()
            .map(|row| MeasuredEntry {
                size: row.sizes.trim().to_string(),
                additional_fields: self.additional_fields(row),
            })
            .collect()
    }
}

impl ChartTable<FootwearSizes> {
    fn entries(&self) -> Vec<FootwearEntry> {
        self.rows
            .iter()
            .map(|row| FootwearEntry {
                uk_size: row.sizes.uk_size.trim().to_string(),
                us_size: row.sizes.us_size.trim().to_string(),
                euro_size: row.sizes.euro_size.trim().to_string(),
                actual_size: row.sizes.actual_size.trim().to_string(),
                additional_fields: self.additional_fields(row),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    #[error("is required")]
    Required,
    #[error("must be between {min} and {max} characters")]
    Length { min: usize, max: usize },
    #[error("must be unique")]
    Duplicate,
    #[error("{0:?} is a reserved field name")]
    Reserved(String),
    #[error("is already in use")]
    NameTaken,
    #[error("is still being checked")]
    NameCheckPending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Form path of the offending input, e.g. `topwear.1.size` or `footwear.fields.0`
    pub path: String,
    pub kind: ValidationErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn for_path(&self, path: &str) -> Option<&ValidationErrorKind> {
        self.0.iter().find(|e| e.path == path).map(|e| &e.kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Default)]
struct Collector(Vec<FieldError>);

impl Collector {
    fn push(&mut self, path: impl Into<String>, kind: ValidationErrorKind) {
        self.0.push(FieldError {
            path: path.into(),
            kind,
        });
    }

    fn required(&mut self, path: impl Into<String>, value: &str) -> bool {
        if value.trim().is_empty() {
            self.push(path, ValidationErrorKind::Required);
            return false;
        }
        true
    }

    /// Flags every repeat after the first occurrence; blanks are left to `required`.
    fn unique<'a>(&mut self, values: impl Iterator<Item = (String, &'a str)>) {
        let mut seen = std::collections::HashSet::new();
        for (path, value) in values {
            let value = value.trim();
            if !value.is_empty() && !seen.insert(value) {
                self.push(path, ValidationErrorKind::Duplicate);
            }
        }
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.0))
        }
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Size group form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeTaxonomyBuilder {
    name: String,
    has_size_chart: bool,
    wear_type: Option<WearType>,
    unit: SizeUnit,
    sizes: Vec<String>,
    topwear: ChartTable<String>,
    bottomwear: ChartTable<String>,
    footwear: ChartTable<FootwearSizes>,
}

impl Default for SizeTaxonomyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SizeTaxonomyBuilder {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            has_size_chart: false,
            wear_type: None,
            unit: SizeUnit::default(),
            sizes: vec![String::new()],
            topwear: ChartTable::template(WearType::Topwear.template_fields()),
            bottomwear: ChartTable::template(WearType::Bottomwear.template_fields()),
            footwear: ChartTable::template(WearType::Footwear.template_fields()),
        }
    }

    /// Rebuild the form of an existing flat group. Charted groups are not edited in place.
    pub fn from_flat_group(group: &SizeGroupSummary) -> Result<Self, TaxonomyError> {
        if group.has_size_chart {
            return Err(TaxonomyError::ChartNotEditable(group.name.clone()));
        }
        let mut builder = Self::new();
        builder.name = group.name.clone();
        builder.sizes = group.labels().map(str::to_string).collect();
        if builder.sizes.is_empty() {
            builder.sizes.push(String::new());
        }
        Ok(builder)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn mode(&self) -> TaxonomyMode {
        match (self.has_size_chart, self.wear_type) {
            (false, _) => TaxonomyMode::Flat,
            (true, None) => TaxonomyMode::ChartPending,
            (true, Some(wear)) => TaxonomyMode::Chart(wear),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn unit(&self) -> SizeUnit {
        self.unit
    }

    /// Applies to every row of every table; stored values are left untouched.
    pub fn set_unit(&mut self, unit: SizeUnit) {
        self.unit = unit;
    }

    pub fn set_size_chart(&mut self, enabled: bool) {
        if enabled == self.has_size_chart {
            return;
        }
        self.has_size_chart = enabled;
        if !enabled {
            self.wear_type = None;
            self.sizes = vec![String::new()];
        }
        debug!(mode = ?self.mode(), "Size chart toggled");
    }

    /// Entering a wear type starts its table over from the template.
    pub fn select_wear_type(&mut self, wear: WearType) -> Result<(), TaxonomyError> {
        if !self.has_size_chart {
            return Err(TaxonomyError::ChartDisabled);
        }
        self.wear_type = Some(wear);
        let template = wear.template_fields();
        match wear {
            WearType::Topwear => self.topwear = ChartTable::template(template),
            WearType::Bottomwear => self.bottomwear = ChartTable::template(template),
            WearType::Footwear => self.footwear = ChartTable::template(template),
        }
        debug!(wear_type = %wear, "Wear type selected");
        Ok(())
    }

    pub fn sizes(&self) -> &[String] {
        &self.sizes
    }

    pub fn add_size(&mut self) -> usize {
        self.sizes.push(String::new());
        self.sizes.len() - 1
    }

    pub fn set_size(&mut self, idx: usize, value: impl Into<String>) -> Result<(), TaxonomyError> {
        let slot = self
            .sizes
            .get_mut(idx)
            .ok_or(TaxonomyError::RowOutOfRange(idx))?;
        *slot = value.into();
        Ok(())
    }

    /// The last remaining label cannot be removed.
    pub fn remove_size(&mut self, idx: usize) -> Result<bool, TaxonomyError> {
        if idx >= self.sizes.len() {
            return Err(TaxonomyError::RowOutOfRange(idx));
        }
        if self.sizes.len() == 1 {
            return Ok(false);
        }
        self.sizes.remove(idx);
        Ok(true)
    }

    pub fn topwear(&self) -> &ChartTable<String> {
        &self.topwear
    }

    pub fn topwear_mut(&mut self) -> &mut ChartTable<String> {
        &mut self.topwear
    }

    pub fn bottomwear(&self) -> &ChartTable<String> {
        &self.bottomwear
    }

    pub fn bottomwear_mut(&mut self) -> &mut ChartTable<String> {
        &mut self.bottomwear
    }

    /// Topwear or bottomwear table
    pub fn measured_mut(&mut self, wear: WearType) -> Option<&mut ChartTable<String>> {
        match wear {
            WearType::Topwear => Some(&mut self.topwear),
            WearType::Bottomwear => Some(&mut self.bottomwear),
            WearType::Footwear => None,
        }
    }

    pub fn footwear(&self) -> &ChartTable<FootwearSizes> {
        &self.footwear
    }

    pub fn footwear_mut(&mut self) -> &mut ChartTable<FootwearSizes> {
        &mut self.footwear
    }

    /// Rows of the active chart, or `None` outside chart mode
    pub fn chart_entries(&self) -> Option<ChartEntries> {
        match self.mode() {
            TaxonomyMode::Chart(WearType::Topwear) => {
                Some(ChartEntries::Topwear(self.topwear.entries()))
            }
            TaxonomyMode::Chart(WearType::Bottomwear) => {
                Some(ChartEntries::Bottomwear(self.bottomwear.entries()))
            }
            TaxonomyMode::Chart(WearType::Footwear) => {
                Some(ChartEntries::Footwear(self.footwear.entries()))
            }
            TaxonomyMode::Flat | TaxonomyMode::ChartPending => None,
        }
    }

    pub fn validate(&self, name_check: &NameCheck) -> Result<(), ValidationErrors> {
        let mut errors = Collector::default();

        let name_len = self.name.trim().chars().count();
        if name_len == 0 {
            errors.push("name", ValidationErrorKind::Required);
        } else if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&name_len) {
            errors.push(
                "name",
                ValidationErrorKind::Length {
                    min: NAME_MIN_CHARS,
                    max: NAME_MAX_CHARS,
                },
            );
        } else {
            match name_check {
                NameCheck::Pending => errors.push("name", ValidationErrorKind::NameCheckPending),
                // Answer for an earlier spelling; a fresh lookup is still due.
                check if check.checked_name().is_some_and(|n| n != self.name.trim()) => {
                    errors.push("name", ValidationErrorKind::NameCheckPending)
                }
                NameCheck::Taken(_) => errors.push("name", ValidationErrorKind::NameTaken),
                NameCheck::Idle | NameCheck::Available(_) | NameCheck::Failed(_) => {}
            }
        }

        match self.mode() {
            TaxonomyMode::Flat => {
                for (i, size) in self.sizes.iter().enumerate() {
                    errors.required(format!("sizes.{i}"), size);
                }
                errors.unique(
                    self.sizes
                        .iter()
                        .enumerate()
                        .map(|(i, s)| (format!("sizes.{i}"), s.as_str())),
                );
            }
            TaxonomyMode::ChartPending => {
                errors.push("wear_type", ValidationErrorKind::Required);
            }
            TaxonomyMode::Chart(wear @ (WearType::Topwear | WearType::Bottomwear)) => {
                let table = match wear {
                    WearType::Topwear => &self.topwear,
                    _ => &self.bottomwear,
                };
                for (i, row) in table.rows.iter().enumerate() {
                    errors.required(format!("{wear}.{i}.size"), &row.sizes);
                }
                errors.unique(
                    table
                        .rows
                        .iter()
                        .enumerate()
                        .map(|(i, row)| (format!("{wear}.{i}.size"), row.sizes.as_str())),
                );
                validate_columns(&mut errors, wear, &table.columns);
            }
            TaxonomyMode::Chart(WearType::Footwear) => {
                let wear = WearType::Footwear;
                for (i, row) in self.footwear.rows.iter().enumerate() {
                    let s = &row.sizes;
                    errors.required(format!("{wear}.{i}.uk_size"), &s.uk_size);
                    errors.required(format!("{wear}.{i}.us_size"), &s.us_size);
                    errors.required(format!("{wear}.{i}.euro_size"), &s.euro_size);
                    errors.required(format!("{wear}.{i}.actual_size"), &s.actual_size);
                }
                errors.unique(
                    self.footwear
                        .rows
                        .iter()
                        .enumerate()
                        .map(|(i, row)| (format!("{wear}.{i}.uk_size"), row.sizes.uk_size.as_str())),
                );
                validate_columns(&mut errors, wear, &self.footwear.columns);
            }
        }

        errors.finish()
    }

    /// Validate, then build the `POST /size` body.
    pub fn payload(
        &self,
        name_check: &NameCheck,
        ids: &mut impl CustomIdSource,
    ) -> Result<CreateSizes, ValidationErrors> {
        self.validate(name_check)?;
        let name = self.name.trim();

        match self.chart_entries() {
            Some(entries) => Ok(transform(&entries, name, self.unit.is_cm(), ids)),
            None => Ok(CreateSizes {
                size_data: self
                    .sizes
                    .iter()
                    .map(|size| NewSize::flat(name, size.trim(), ids.next_id()))
                    .collect(),
                size_chart_data: Vec::new(),
            }),
        }
    }
}

/// Column labels: required, unique ignoring case, and clear of the wear type's own size fields.
fn validate_columns(errors: &mut Collector, wear: WearType, columns: &[Column]) {
    let reserved = wear.reserved_labels();
    let mut seen = std::collections::HashSet::new();
    for (j, column) in columns.iter().enumerate() {
        let path = format!("{wear}.fields.{j}");
        if !errors.required(path.clone(), &column.label) {
            continue;
        }
        let normalized = normalize_label(&column.label);
        if reserved.contains(&normalized.as_str()) {
            errors.push(
                path,
                ValidationErrorKind::Reserved(column.label.trim().to_string()),
            );
        } else if !seen.insert(normalized) {
            errors.push(path, ValidationErrorKind::Duplicate);
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid size group: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error("api error: {0}")]
    Api(#[from] ApiError),
}

impl SubmitError {
    /// Toast text
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(errors) => errors.to_string(),
            Self::Api(e) => e.user_message(),
        }
    }
}

/// Sends a validated size group to the backend in one call.
pub struct SizeTaxonomyService<A> {
    api: Arc<A>,
}

impl<A: SizeApi> SizeTaxonomyService<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Post the group. On success the builder is cleared; on failure it is left as it was.
    pub async fn submit(
        &self,
        builder: &mut SizeTaxonomyBuilder,
        name_check: &NameCheck,
    ) -> Result<CreateSizes, SubmitError> {
        self.submit_with_ids(builder, name_check, &mut UuidSource)
            .await
    }

    pub async fn submit_with_ids(
        &self,
        builder: &mut SizeTaxonomyBuilder,
        name_check: &NameCheck,
        ids: &mut impl CustomIdSource,
    ) -> Result<CreateSizes, SubmitError> {
        let payload = builder.payload(name_check, ids)?;

        if let Err(e) = self.api.create_sizes(&payload).await {
            warn!(group = %builder.name(), error = %e, "Creating size group failed");
            return Err(e.into());
        }

        info!(
            group = %builder.name(),
            mode = ?builder.mode(),
            sizes = payload.size_data.len(),
            chart_fields = payload.size_chart_data.len(),
            "Size group created"
        );
        builder.reset();
        Ok(payload)
    }
}
