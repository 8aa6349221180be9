//! TOML files describing a size group or a product's size pricing.

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result, bail};
use models::size::{SizeUnit, WearType};
use serde::Deserialize;
use services::services::{
    size_taxonomy::{ChartTable, FootwearSizes, SizeTaxonomyBuilder},
    variant_pricing::{PricingField, VariantPricingGrid},
};

pub fn read<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid definition {}", path.display()))
}

#[derive(Debug, Deserialize)]
pub struct GroupDefinition {
    pub name: String,
    #[serde(default)]
    pub unit: SizeUnit,
    #[serde(default)]
    pub sizes: Vec<String>,
    pub chart: Option<ChartDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct ChartDefinition {
    pub wear_type: WearType,
    /// Replaces the wear type's template columns when given
    pub fields: Option<Vec<String>>,
    pub rows: Vec<RowDefinition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RowDefinition {
    pub size: String,
    pub uk_size: String,
    pub us_size: String,
    pub euro_size: String,
    pub actual_size: String,
    pub values: BTreeMap<String, String>,
}

impl GroupDefinition {
    /// Replay the definition through the form, the same way an operator would fill it in.
    pub fn to_builder(&self) -> Result<SizeTaxonomyBuilder> {
        let mut builder = SizeTaxonomyBuilder::new();
        builder.set_name(self.name.as_str());
        builder.set_unit(self.unit);

        let Some(chart) = &self.chart else {
            for (i, size) in self.sizes.iter().enumerate() {
                let idx = if i == 0 { 0 } else { builder.add_size() };
                builder.set_size(idx, size.as_str())?;
            }
            return Ok(builder);
        };

        if !self.sizes.is_empty() {
            bail!("`sizes` and `chart` cannot both be set");
        }
        builder.set_size_chart(true);
        builder.select_wear_type(chart.wear_type)?;

        match chart.wear_type {
            WearType::Topwear | WearType::Bottomwear => {
                let Some(table) = builder.measured_mut(chart.wear_type) else {
                    bail!("no table for {}", chart.wear_type);
                };
                fill(table, chart, |sizes, row| *sizes = row.size.clone())?;
            }
            WearType::Footwear => {
                fill(builder.footwear_mut(), chart, |sizes, row| {
                    *sizes = FootwearSizes {
                        uk_size: row.uk_size.clone(),
                        us_size: row.us_size.clone(),
                        euro_size: row.euro_size.clone(),
                        actual_size: row.actual_size.clone(),
                    }
                })?;
            }
        }
        Ok(builder)
    }
}

fn fill<S: Default>(
    table: &mut ChartTable<S>,
    chart: &ChartDefinition,
    set_sizes: impl Fn(&mut S, &RowDefinition),
) -> Result<()> {
    if let Some(fields) = &chart.fields {
        let existing: Vec<_> = table.columns().iter().map(|c| c.id).collect();
        for id in existing {
            table.remove_column(id)?;
        }
        for label in fields {
            table.add_column(label.as_str());
        }
    }

    for (i, row) in chart.rows.iter().enumerate() {
        let idx = if i == 0 { 0 } else { table.add_row() };
        set_sizes(table.sizes_mut(idx)?, row);
        for (label, value) in &row.values {
            let column = table
                .column_by_label(label)
                .with_context(|| format!("row {i}: unknown field {label:?}"))?;
            table.set_value(idx, column, value.as_str())?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeDefinition {
    Create,
    Variant,
    Edit,
}

#[derive(Debug, Deserialize)]
pub struct VariantDefinition {
    pub custom_product_id: String,
    pub mode: ModeDefinition,
    pub size_type: String,
    /// Size type the product was saved with; defaults to `size_type`
    pub original_size_type: Option<String>,
    #[serde(default)]
    pub dynamic_pricing: bool,
    pub price: Option<f64>,
    pub discount: Option<f64>,
    /// Keyed by size label
    pub sizes: BTreeMap<String, SizeValues>,
}

#[derive(Debug, Deserialize)]
pub struct SizeValues {
    pub quantity: u32,
    pub price: Option<f64>,
    pub discount: Option<f64>,
}

impl VariantDefinition {
    /// Write the definition's values into an already loaded grid.
    pub fn apply(&self, grid: &mut VariantPricingGrid) -> Result<()> {
        if !self.dynamic_pricing {
            if let Some(price) = self.price {
                grid.set_product_price(price.to_string())?;
            }
            if let Some(discount) = self.discount {
                grid.set_product_discount(discount.to_string())?;
            }
        }

        for row in 0..grid.rows().len() {
            let label = grid.rows()[row].size_label.clone();
            let Some(values) = self.sizes.get(&label) else {
                continue;
            };
            let mut set = |field: PricingField, value: String| -> Result<()> {
                let key = grid
                    .key(row, field)
                    .with_context(|| format!("no row for size {label:?}"))?;
                grid.set(&key, value)?;
                Ok(())
            };
            set(PricingField::Quantity, values.quantity.to_string())?;
            if self.dynamic_pricing {
                set(PricingField::Price, values.price.unwrap_or(0.0).to_string())?;
                set(
                    PricingField::Discount,
                    values.discount.unwrap_or(0.0).to_string(),
                )?;
            }
        }
        Ok(())
    }
}
