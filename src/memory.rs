use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::records::{ScoreRecord, UserRecord};
use crate::store::{Store, UserFilter, UserHit};

/// In-process implementation of [`Store`].
///
/// Doubles as the dry-run backend: a load against it exercises the whole
/// parse-and-batch path without touching a remote service. Keys iterate in
/// sorted order, which keeps scan and search output deterministic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    hashes: BTreeMap<String, BTreeMap<String, String>>,
    zsets: BTreeMap<String, BTreeMap<String, i64>>,
}

fn key_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

fn filter_matches(filter: &UserFilter, fields: &BTreeMap<String, String>) -> bool {
    if let Some(gender) = &filter.gender {
        if !fields
            .get("gender")
            .is_some_and(|g| g.eq_ignore_ascii_case(gender))
        {
            return false;
        }
    }
    if !filter.countries.is_empty() {
        let Some(country) = fields.get("country") else {
            return false;
        };
        if !filter
            .countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country))
        {
            return false;
        }
    }
    if let Some(range) = &filter.latitude {
        let Some(latitude) = fields.get("latitude").and_then(|v| v.parse::<f64>().ok()) else {
            return false;
        };
        if !range.contains(&latitude) {
            return false;
        }
    }
    true
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn write_users(&self, batch: &[UserRecord]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for user in batch {
            let hash = inner.hashes.entry(user.key()).or_default();
            for (field, value) in user.field_pairs() {
                hash.insert(field.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    async fn write_scores(&self, batch: &[ScoreRecord]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for score in batch {
            inner
                .zsets
                .entry(score.key())
                .or_default()
                .insert(score.user_id.clone(), score.score);
        }
        Ok(())
    }

    async fn hash_all(&self, key: &str) -> Result<Vec<(String, String)>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .hashes
            .get(key)
            .map(|hash| {
                hash.iter()
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn hash_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field))
            .cloned())
    }

    async fn scan_keys(
        &self,
        _cursor: u64,
        pattern: &str,
        _count: usize,
    ) -> Result<(u64, Vec<String>)> {
        // The whole keyspace fits in one page; any cursor returns everything
        // and terminates the scan.
        let inner = self.inner.lock().await;
        let keys = inner
            .hashes
            .keys()
            .filter(|key| key_matches(pattern, key))
            .cloned()
            .collect();
        Ok((0, keys))
    }

    async fn leaderboard_top(&self, leaderboard: &str, n: usize) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        let Some(zset) = inner.zsets.get(&format!("leaderboard:{}", leaderboard)) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(&String, i64)> = zset.iter().map(|(m, s)| (m, *s)).collect();
        // Descending score, ties in reverse lexical order, matching the
        // reverse-range semantics of the hosted store.
        members.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(a.0)));
        Ok(members
            .into_iter()
            .take(n)
            .map(|(member, _)| member.clone())
            .collect())
    }

    async fn ensure_user_index(&self) -> Result<()> {
        // Searches evaluate the filter directly; there is no index to build.
        Ok(())
    }

    async fn search_users(&self, filter: &UserFilter) -> Result<Vec<UserHit>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .hashes
            .iter()
            .filter(|(key, _)| key.starts_with("user:"))
            .filter(|(_, fields)| filter_matches(filter, fields))
            .map(|(key, fields)| UserHit {
                key: key.clone(),
                fields: fields
                    .iter()
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect(),
            })
            .collect())
    }
}
