use std::{env, path::PathBuf};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub media_root: PathBuf,
    pub max_upload_bytes: usize,
    pub session_secure: bool,
    pub superuser: Option<SuperuserSeed>,
}

/// Account created at startup when it does not exist yet.
#[derive(Clone, Debug)]
pub struct SuperuserSeed {
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // A missing .env is fine in containers where the environment is set directly.
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(err.into());
            }
        }

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is not set in .env file"))?;
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "debug".into());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
        let media_root = env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("media"));
        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("MAX_UPLOAD_BYTES must be a byte count"))?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };
        let session_secure = env::var("SESSION_SECURE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let superuser = match (
            env::var("SUPERUSER_USERNAME"),
            env::var("SUPERUSER_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(SuperuserSeed { username, password }),
            _ => None,
        };

        Ok(Self {
            database_url,
            rust_log,
            bind_addr,
            media_root,
            max_upload_bytes,
            session_secure,
            superuser,
        })
    }
}
