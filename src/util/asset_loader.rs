use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use minijinja::Environment;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Backs the `asset()` template function: `asset("css/site.css")` becomes
/// `/static/css/site.css?v=<sha256 of the file>`.
#[derive(Debug, Clone)]
pub struct AssetLoader {
    root: PathBuf,
    url_prefix: String,
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl AssetLoader {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
            cache: Arc::default(),
        }
    }

    pub fn asset_path(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if let Some(hashed) = self.cache.read().ok().and_then(|c| c.get(path).cloned()) {
            return hashed;
        }

        let url = format!("{}/{}", self.url_prefix, path);
        match fs::read(self.root.join(path)) {
            Ok(contents) => {
                let hashed = format!("{url}?v={:x}", Sha256::digest(&contents));
                if let Ok(mut cache) = self.cache.write() {
                    cache.insert(path.to_string(), hashed.clone());
                }
                hashed
            }
            // Not cached, so the file is picked up once it appears.
            Err(err) => {
                warn!(asset = path, error = %err, "static asset not readable");
                url
            }
        }
    }

    pub fn register(&self, env: &mut Environment<'_>) {
        let loader = self.clone();
        env.add_function("asset", move |path: String| loader.asset_path(&path));
    }
}
