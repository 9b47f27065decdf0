use std::fmt::{Display, Formatter};
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::parser;
use crate::store::Store;

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Outcome of a bulk load. Recoverable per-entry failures end up in
/// `rejected`; the caller decides whether a partial load is acceptable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: u64,
    pub rejected: u64,
}

impl Display for LoadReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} loaded, {} rejected", self.loaded, self.rejected)
    }
}

/// Parses the user file at `path` and writes the records to `store` in
/// batches of `batch_size`. Malformed chunks are skipped and counted; an
/// unreadable file fails the whole operation.
pub async fn load_users<S: Store + ?Sized>(
    store: &S,
    path: &Path,
    batch_size: usize,
) -> Result<LoadReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading user file {}", path.display()))?;

    let batch_size = batch_size.max(1);
    let mut report = LoadReport::default();
    let mut batch = Vec::with_capacity(batch_size);

    for parsed in parser::user_records(&text) {
        match parsed {
            Ok(user) => {
                batch.push(user);
                if batch.len() >= batch_size {
                    store.write_users(&batch).await?;
                    report.loaded += batch.len() as u64;
                    debug!(total = report.loaded, "flushed user batch");
                    batch.clear();
                }
            }
            Err(err) => {
                warn!(%err, file = %path.display(), "skipping user entry");
                report.rejected += 1;
            }
        }
    }
    if !batch.is_empty() {
        store.write_users(&batch).await?;
        report.loaded += batch.len() as u64;
    }

    info!(loaded = report.loaded, rejected = report.rejected, "user load finished");
    Ok(report)
}

/// Parses the CSV score file at `path` and writes the records to `store` in
/// batches of `batch_size`, with the same skip-and-count policy as
/// [`load_users`].
pub async fn load_scores<S: Store + ?Sized>(
    store: &S,
    path: &Path,
    batch_size: usize,
) -> Result<LoadReport> {
    let file =
        File::open(path).with_context(|| format!("reading score file {}", path.display()))?;

    let batch_size = batch_size.max(1);
    let mut report = LoadReport::default();
    let mut batch = Vec::with_capacity(batch_size);

    for parsed in parser::score_records(file) {
        match parsed {
            Ok(score) => {
                batch.push(score);
                if batch.len() >= batch_size {
                    store.write_scores(&batch).await?;
                    report.loaded += batch.len() as u64;
                    debug!(total = report.loaded, "flushed score batch");
                    batch.clear();
                }
            }
            Err(err) => {
                warn!(%err, file = %path.display(), "skipping score row");
                report.rejected += 1;
            }
        }
    }
    if !batch.is_empty() {
        store.write_scores(&batch).await?;
        report.loaded += batch.len() as u64;
    }

    info!(loaded = report.loaded, rejected = report.rejected, "score load finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::memory::MemoryStore;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("kvseed-{}-{}", std::process::id(), name));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn user_line(id: u32) -> String {
        format!(
            "\"user:{id}\" \"n\" \"Ann\" \"l\" \"Lee\" \"e\" \"u{id}@example.com\" \
             \"g\" \"F\" \"ip\" \"1.2.3.4\" \"c\" \"USA\" \"cc\" \"US\" \"ci\" \"NYC\" \
             \"lo\" \"-73.9\" \"la\" \"40.7\"\n"
        )
    }

    #[tokio::test]
    async fn loads_users_and_counts_rejects() {
        let mut contents = String::new();
        for id in 0..9 {
            contents.push_str(&user_line(id));
        }
        contents.push_str("\"user:99\" \"n\" \"Bob\"\n");
        let path = write_temp("users-mixed.txt", &contents);

        let store = MemoryStore::default();
        let report = load_users(&store, &path, 4).await.unwrap();
        assert_eq!(report, LoadReport { loaded: 9, rejected: 1 });

        // The remainder batch was flushed too.
        let email = store.hash_field("user:8", "email").await.unwrap();
        assert_eq!(email.as_deref(), Some("u8@example.com"));

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn loads_scores_and_skips_bad_rows() {
        let path = write_temp(
            "scores-mixed.csv",
            "user:id,score,leaderboard\n7,150,2\n8,lots,2\n9,90,1\n",
        );

        let store = MemoryStore::default();
        let report = load_scores(&store, &path, DEFAULT_BATCH_SIZE).await.unwrap();
        assert_eq!(report, LoadReport { loaded: 2, rejected: 1 });

        let top = store.leaderboard_top("2", 10).await.unwrap();
        assert_eq!(top, vec!["7".to_string()]);

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let store = MemoryStore::default();
        let err = load_users(&store, Path::new("does-not-exist.txt"), 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does-not-exist.txt"));
    }
}
