//! Uploaded attachment files on local disk.
//!
//! Files live under `<root>/event_attachments/YYYY/MM/DD/`. Records in the
//! database store the path relative to the root.

use std::{
    io,
    path::{Component, Path, PathBuf},
};

use chrono::{Datelike, NaiveDate};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

const UPLOAD_DIR: &str = "event_attachments";

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `contents` and returns the stored path relative to the root.
    /// A random suffix keeps existing files with the same name intact; the
    /// file is created exclusively so concurrent uploads never share one.
    pub async fn save(&self, original_name: &str, contents: &[u8], day: NaiveDate) -> io::Result<String> {
        let relative_dir = PathBuf::from(UPLOAD_DIR)
            .join(format!("{:04}", day.year()))
            .join(format!("{:02}", day.month()))
            .join(format!("{:02}", day.day()));
        let dir = self.root.join(&relative_dir);
        fs::create_dir_all(&dir).await?;

        let name = sanitize_file_name(original_name);
        let mut candidate = name.clone();
        let mut file = loop {
            let opened = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(dir.join(&candidate))
                .await;
            match opened {
                Ok(file) => break file,
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = with_suffix(&name, &uuid::Uuid::new_v4().simple().to_string()[..7]);
                }
                Err(err) => return Err(err),
            }
        };

        let written = async {
            file.write_all(contents).await?;
            file.flush().await
        }
        .await;
        if let Err(err) = written {
            drop(file);
            self.delete(&to_url_path(&relative_dir.join(&candidate))).await;
            return Err(err);
        }
        debug!(file = %candidate, "attachment stored");

        Ok(to_url_path(&relative_dir.join(candidate)))
    }

    /// Best-effort removal of a stored file and the directories it leaves
    /// empty. Failures are logged, never returned.
    pub async fn delete(&self, relative: &str) {
        let Some(path) = self.resolve(relative) else {
            warn!(file = relative, "refusing to delete path outside media root");
            return;
        };

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "cannot inspect attachment");
                return;
            }
        }

        if let Err(err) = fs::remove_file(&path).await {
            warn!(file = %path.display(), error = %err, "failed to delete attachment file");
            return;
        }
        debug!(file = %path.display(), "attachment file deleted");

        self.prune_empty_dirs(&path).await;
    }

    async fn prune_empty_dirs(&self, file: &Path) {
        let mut dir = file.parent().map(Path::to_path_buf);
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            match is_empty_dir(&current).await {
                Ok(true) => {
                    if let Err(err) = fs::remove_dir(&current).await {
                        warn!(dir = %current.display(), error = %err, "failed to remove empty directory");
                        break;
                    }
                }
                Ok(false) => break,
                Err(err) => {
                    warn!(dir = %current.display(), error = %err, "failed to read directory");
                    break;
                }
            }
            dir = current.parent().map(Path::to_path_buf);
        }
    }

    /// Joins a stored relative path onto the root, rejecting anything that
    /// could climb out of it.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let normal = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        (normal && relative.components().next().is_some()).then(|| self.root.join(relative))
    }
}

async fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    let mut entries = fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}

fn to_url_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Keeps only the final path component and replaces characters that are
/// awkward in URLs or file systems.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{suffix}.{ext}"),
        _ => format!("{name}_{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\plan v2.pdf"), "plan_v2.pdf");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(with_suffix("plan.pdf", "abc"), "plan_abc.pdf");
        assert_eq!(with_suffix("README", "abc"), "README_abc");
    }

    #[tokio::test]
    async fn saves_under_dated_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(tmp.path());

        let stored = store.save("agenda.txt", b"hello", day()).await.unwrap();
        assert_eq!(stored, "event_attachments/2025/03/07/agenda.txt");
        let contents = std::fs::read(tmp.path().join(&stored)).unwrap();
        assert_eq!(contents, b"hello");

        let second = store.save("agenda.txt", b"again", day()).await.unwrap();
        assert_ne!(second, stored);
        assert!(second.starts_with("event_attachments/2025/03/07/agenda_"));
        assert_eq!(std::fs::read(tmp.path().join(&stored)).unwrap(), b"hello");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_name_saves_get_distinct_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(tmp.path());

        for _ in 0..20 {
            let uploads: Vec<_> = (0u8..8)
                .map(|i| {
                    let store = store.clone();
                    tokio::spawn(async move { (i, store.save("agenda.txt", &[i], day()).await) })
                })
                .collect();

            let mut paths = std::collections::HashSet::new();
            for upload in uploads {
                let (i, stored) = upload.await.unwrap();
                let stored = stored.unwrap();
                assert_eq!(std::fs::read(tmp.path().join(&stored)).unwrap(), vec![i]);
                assert!(paths.insert(stored));
            }
            assert_eq!(paths.len(), 8);

            for path in &paths {
                store.delete(path).await;
            }
        }
    }

    #[tokio::test]
    async fn delete_prunes_empty_dirs_up_to_root() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(tmp.path());
        let stored = store.save("agenda.txt", b"hello", day()).await.unwrap();

        store.delete(&stored).await;

        assert!(!tmp.path().join(&stored).exists());
        assert!(!tmp.path().join(UPLOAD_DIR).exists());
        assert!(tmp.path().exists());
    }

    #[tokio::test]
    async fn delete_stops_at_non_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(tmp.path());
        let other_day = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let kept = store.save("keep.txt", b"keep", other_day).await.unwrap();
        let gone = store.save("gone.txt", b"gone", day()).await.unwrap();

        store.delete(&gone).await;

        assert!(!tmp.path().join("event_attachments/2025/03/07").exists());
        assert!(tmp.path().join("event_attachments/2025/03").is_dir());
        assert!(tmp.path().join(&kept).is_file());
    }

    #[tokio::test]
    async fn delete_swallows_missing_and_hostile_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(tmp.path().join("media"));
        std::fs::create_dir_all(store.root()).unwrap();
        let outside = tmp.path().join("outside.txt");
        std::fs::write(&outside, b"x").unwrap();

        store.delete("event_attachments/2025/01/01/missing.txt").await;
        store.delete("../outside.txt").await;
        store.delete("").await;

        assert!(outside.exists());
        assert!(store.root().exists());
    }
}
