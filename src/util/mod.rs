pub mod asset_loader;
pub mod templates;
