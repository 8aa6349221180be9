mod definition;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use definition::{GroupDefinition, ModeDefinition, VariantDefinition};
use secrecy::SecretString;
use services::services::{
    admin_api::{AdminApiClient, SizeQuantityApi},
    name_check::{NameAvailabilityChecker, NameCheck},
    size_catalog::SizeCatalog,
    size_taxonomy::{SizeTaxonomyBuilder, SizeTaxonomyService},
    variant_pricing::{PricingMode, VariantPricingGrid, VariantPricingService},
};
use tracing::{debug, info};
use utils::config::{API_URL_ENV, AdminConfig, TOKEN_ENV};

#[derive(Parser, Debug)]
#[command(author, version, about = "Manage size groups and per-size product pricing")]
struct Cli {
    /// Config file, defaults to `<config dir>/size-admin/config.toml`
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = API_URL_ENV)]
    api_url: Option<String>,
    #[arg(long, global = true, env = TOKEN_ENV, hide_env_values = true)]
    token: Option<String>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List size groups
    Groups,
    /// Check whether a size group name is free
    CheckName { name: String },
    /// Create a size group from a TOML definition
    Create { file: PathBuf },
    /// Replace the labels of a group without a size chart
    Edit {
        name: String,
        #[arg(long = "size", required = true)]
        sizes: Vec<String>,
    },
    /// Delete every row of a size group
    Delete { name: String },
    /// Show the saved size rows of a product
    Quantities { custom_product_id: String },
    /// Save a product's quantities and prices from a TOML definition
    Pricing { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::logging::init(cli.verbose.then_some("debug"));

    let mut config = AdminConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url)?;
    }
    if let Some(token) = cli.token {
        config.token = Some(SecretString::from(token));
    }
    debug!(api_url = %config.api_url, "Resolved configuration");

    let client = Arc::new(AdminApiClient::from_config(&config)?);
    let catalog = SizeCatalog::new(client.clone());

    match cli.command {
        Command::Groups => {
            for group in catalog.groups().await? {
                let kind = match group.wear_type {
                    Some(wear) if group.has_size_chart => format!("chart/{wear}"),
                    _ => "flat".to_string(),
                };
                let labels: Vec<_> = group.labels().collect();
                println!(
                    "{:<24} {:<16} {:>3}  {}",
                    group.name,
                    kind,
                    group.count(),
                    labels.join(", ")
                );
            }
        }
        Command::CheckName { name } => {
            let checker = NameAvailabilityChecker::new(client.clone(), config.name_check_debounce);
            match checker.check_now(&name).await {
                NameCheck::Available(_) => println!("{name:?} is available"),
                NameCheck::Taken(_) => bail!("{name:?} is already used"),
                NameCheck::Failed(message) => bail!("name check failed: {message}"),
                NameCheck::Idle | NameCheck::Pending => {
                    bail!("{name:?} must be between 2 and 40 characters")
                }
            }
        }
        Command::Create { file } => {
            let def: GroupDefinition = definition::read(&file)?;
            let mut builder = def.to_builder()?;
            let checker = NameAvailabilityChecker::new(client.clone(), config.name_check_debounce);
            let name_check = checker.check_now(builder.name()).await;
            if let NameCheck::Failed(message) = &name_check {
                tracing::warn!(%message, "Submitting without a name check");
            }

            let service = SizeTaxonomyService::new(client.clone());
            let payload = service
                .submit(&mut builder, &name_check)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!(
                "Created {:?}: {} sizes, {} chart fields",
                def.name,
                payload.size_data.len(),
                payload.size_chart_data.len()
            );
        }
        Command::Edit { name, sizes } => {
            let original = catalog.group(&name).await?;
            let mut edited = SizeTaxonomyBuilder::from_flat_group(&original)?;
            while edited.sizes().len() > 1 {
                edited.remove_size(0)?;
            }
            for (i, size) in sizes.iter().enumerate() {
                let idx = if i == 0 { 0 } else { edited.add_size() };
                edited.set_size(idx, size.as_str())?;
            }

            let plan = catalog.save_flat_edit(&original, &edited).await?;
            if plan.is_empty() {
                println!("{name:?} unchanged");
            } else {
                println!(
                    "Updated {name:?}: {} removed, {} added",
                    plan.removed.len(),
                    plan.added.size_data.len()
                );
            }
        }
        Command::Delete { name } => {
            let rows = catalog.delete_group(&name).await?;
            println!("Deleted {name:?} ({rows} rows)");
        }
        Command::Quantities { custom_product_id } => {
            let rows = client
                .list_size_quantities(&custom_product_id)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            for row in rows {
                println!(
                    "{:>6} size={:<6} qty={:<5} price={:<8} discount={}",
                    row.id, row.size_id, row.quantity, row.price, row.discount
                );
            }
        }
        Command::Pricing { file } => {
            let def: VariantDefinition = definition::read(&file)?;
            let sizes = catalog
                .sizes_of_type(&def.size_type)
                .await
                .with_context(|| format!("loading size type {:?}", def.size_type))?;
            let service = VariantPricingService::new(client.clone());

            let mut grid = match def.mode {
                ModeDefinition::Edit => {
                    let original = def.original_size_type.as_deref().unwrap_or(&def.size_type);
                    let original_sizes = if original == def.size_type {
                        sizes.clone()
                    } else {
                        catalog.sizes_of_type(original).await?
                    };
                    let mut grid = service
                        .load(
                            &def.custom_product_id,
                            original,
                            &original_sizes,
                            def.dynamic_pricing,
                        )
                        .await
                        .map_err(|e| anyhow!(e.user_message()))?;
                    if original != def.size_type {
                        grid.select_size_type(&def.size_type, &sizes);
                    }
                    grid
                }
                ModeDefinition::Create | ModeDefinition::Variant => {
                    let mode = match def.mode {
                        ModeDefinition::Variant => PricingMode::NewVariant,
                        _ => PricingMode::Create,
                    };
                    let mut grid = VariantPricingGrid::new(def.custom_product_id.as_str(), mode);
                    grid.set_dynamic_pricing(def.dynamic_pricing);
                    grid.select_size_type(&def.size_type, &sizes);
                    grid
                }
            };

            def.apply(&mut grid)?;
            let missing = grid.missing_quantities();
            if !missing.is_empty() {
                bail!("quantity missing for {}", missing.join(", "));
            }

            let price = grid.product_price();
            let strategy = service
                .save(&grid)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            info!(product = %def.custom_product_id, %strategy, "Saved size pricing");
            println!(
                "Saved {} sizes ({strategy}); product price {} discount {}",
                grid.rows().len(),
                price.price,
                price.discount
            );
        }
    }

    Ok(())
}
