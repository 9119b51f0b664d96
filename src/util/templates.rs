use std::fmt::Write;
use std::path::Path;

use chrono::NaiveDateTime;
use minijinja::Environment;

use super::asset_loader::AssetLoader;

const DEFAULT_DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M";

pub fn setup_templates(template_dir: impl AsRef<Path>, static_dir: impl AsRef<Path>) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_loader(minijinja::path_loader(template_dir.as_ref().to_path_buf()));
    AssetLoader::new(static_dir.as_ref(), "/static").register(&mut env);
    env.add_function("media", media_url);
    env.add_filter("datetime", format_datetime);
    env
}

/// URL of an uploaded file stored under the media root.
fn media_url(path: String) -> String {
    format!("/media/{}", path.trim_start_matches('/'))
}

/// Formats a serialized `NaiveDateTime`. Anything else is passed through.
fn format_datetime(value: String, format: Option<String>) -> String {
    let Ok(parsed) = NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%S%.f") else {
        return value;
    };
    let mut out = String::new();
    let format = format.as_deref().unwrap_or(DEFAULT_DATETIME_FORMAT);
    match write!(out, "{}", parsed.format(format)) {
        Ok(()) => out,
        Err(_) => value,
    }
}
