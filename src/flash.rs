//! One-shot status messages carried in the session until the next rendered page.

use axum_login::tower_sessions::{Session, session};
use serde::{Deserialize, Serialize};

const FLASH_KEY: &str = "flash.messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub text: String,
}

pub async fn push(session: &Session, level: Level, text: impl Into<String>) -> Result<(), session::Error> {
    let mut queued: Vec<Flash> = session.get(FLASH_KEY).await?.unwrap_or_default();
    queued.push(Flash {
        level,
        text: text.into(),
    });
    session.insert(FLASH_KEY, queued).await
}

pub async fn success(session: &Session, text: impl Into<String>) -> Result<(), session::Error> {
    push(session, Level::Success, text).await
}

pub async fn error(session: &Session, text: impl Into<String>) -> Result<(), session::Error> {
    push(session, Level::Error, text).await
}

pub async fn take(session: &Session) -> Result<Vec<Flash>, session::Error> {
    Ok(session.remove(FLASH_KEY).await?.unwrap_or_default())
}
