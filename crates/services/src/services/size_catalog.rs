//! Read side of the size taxonomy. The backend lists one row per size label; groups are
//! rebuilt here by name.

use std::sync::Arc;

use models::size::{CreateSizes, NewSize, Size, SizeId, WearType};
use thiserror::Error;
use tracing::info;

use super::{
    admin_api::{ApiError, SizeApi},
    name_check::NameCheck,
    size_chart::{CustomIdSource, UuidSource},
    size_taxonomy::{SizeTaxonomyBuilder, ValidationErrors},
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error("size group {0:?} not found")]
    GroupNotFound(String),
    #[error("invalid size group: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error("size group {from:?} cannot be renamed to {to:?}")]
    Renamed { from: String, to: String },
}

/// All size rows sharing one name
#[derive(Debug, Clone, PartialEq)]
pub struct SizeGroupSummary {
    pub name: String,
    pub has_size_chart: bool,
    pub wear_type: Option<WearType>,
    pub is_cm: Option<bool>,
    pub sizes: Vec<Size>,
}

impl SizeGroupSummary {
    pub fn count(&self) -> usize {
        self.sizes.len()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.sizes.iter().map(|s| s.size.as_str())
    }

    pub fn size_ids(&self) -> Vec<SizeId> {
        self.sizes.iter().map(|s| s.id).collect()
    }
}

/// Group rows by name, keeping the order in which names and rows first appear.
pub fn group_sizes(rows: &[Size]) -> Vec<SizeGroupSummary> {
    let mut groups: Vec<SizeGroupSummary> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|g| g.name == row.name) {
            Some(group) => group.sizes.push(row.clone()),
            None => groups.push(SizeGroupSummary {
                name: row.name.clone(),
                has_size_chart: row.has_size_chart,
                wear_type: row.wear_type,
                is_cm: row.is_cm,
                sizes: vec![row.clone()],
            }),
        }
    }
    groups
}

/// Changes needed to bring a persisted flat group in line with an edited form
#[derive(Debug, Clone, PartialEq)]
pub struct FlatGroupEdit {
    pub removed: Vec<SizeId>,
    pub added: CreateSizes,
}

impl FlatGroupEdit {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.size_data.is_empty()
    }
}

/// Labels missing from the form are deleted, new labels are posted. Unchanged labels keep their
/// row ids, so size quantities referencing them survive the edit.
pub fn plan_flat_edit(
    original: &SizeGroupSummary,
    edited: &SizeTaxonomyBuilder,
    ids: &mut impl CustomIdSource,
) -> FlatGroupEdit {
    let wanted: Vec<&str> = edited
        .sizes()
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let removed = original
        .sizes
        .iter()
        .filter(|row| !wanted.contains(&row.size.as_str()))
        .map(|row| row.id)
        .collect();

    let mut added: Vec<&str> = Vec::new();
    for label in wanted {
        if !added.contains(&label) && !original.labels().any(|existing| existing == label) {
            added.push(label);
        }
    }
    let size_data = added
        .into_iter()
        .map(|label| NewSize::flat(original.name.as_str(), label, ids.next_id()))
        .collect();

    FlatGroupEdit {
        removed,
        added: CreateSizes {
            size_data,
            size_chart_data: Vec::new(),
        },
    }
}

/// Fetches and maintains size groups
pub struct SizeCatalog<A> {
    api: Arc<A>,
}

impl<A: SizeApi> SizeCatalog<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub async fn groups(&self) -> Result<Vec<SizeGroupSummary>, CatalogError> {
        Ok(group_sizes(&self.api.list_sizes().await?))
    }

    pub async fn group(&self, name: &str) -> Result<SizeGroupSummary, CatalogError> {
        self.groups()
            .await?
            .into_iter()
            .find(|g| g.name == name)
            .ok_or_else(|| CatalogError::GroupNotFound(name.to_string()))
    }

    /// Sizes of one size type, in listing order
    pub async fn sizes_of_type(&self, name: &str) -> Result<Vec<Size>, CatalogError> {
        Ok(self.group(name).await?.sizes)
    }

    /// Delete every row of a group in one call
    pub async fn delete_group(&self, name: &str) -> Result<usize, CatalogError> {
        let group = self.group(name).await?;
        let ids = group.size_ids();
        self.api.delete_sizes(&ids).await?;
        info!(group = %name, rows = ids.len(), "Deleted size group");
        Ok(ids.len())
    }

    /// Apply an edited flat group: delete dropped labels, then post new ones. The two calls are
    /// not atomic. Rows are keyed by group name, so the name cannot change here.
    pub async fn save_flat_edit(
        &self,
        original: &SizeGroupSummary,
        edited: &SizeTaxonomyBuilder,
    ) -> Result<FlatGroupEdit, CatalogError> {
        let name = edited.name().trim();
        if name != original.name.trim() {
            return Err(CatalogError::Renamed {
                from: original.name.clone(),
                to: name.to_string(),
            });
        }
        // The persisted group owns its name, so no lookup is needed.
        edited.validate(&NameCheck::Available(name.to_string()))?;

        let plan = plan_flat_edit(original, edited, &mut UuidSource);
        if !plan.removed.is_empty() {
            self.api.delete_sizes(&plan.removed).await?;
        }
        if !plan.added.size_data.is_empty() {
            self.api.create_sizes(&plan.added).await?;
        }
        info!(
            group = %original.name,
            removed = plan.removed.len(),
            added = plan.added.size_data.len(),
            "Saved size group edit"
        );
        Ok(plan)
    }
}
