pub mod admin_api;
pub mod name_check;
pub mod size_catalog;
pub mod size_chart;
pub mod size_taxonomy;
pub mod variant_pricing;
