use std::ops::RangeInclusive;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::records::{ScoreRecord, UserRecord};

/// Structured search filter over user profiles. Backends with a native
/// search engine render it into their query syntax; the in-process backend
/// evaluates it directly.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Exact gender match, case-insensitive.
    pub gender: Option<String>,
    /// Accept any of these countries; empty means no country constraint.
    pub countries: Vec<String>,
    /// Closed latitude range.
    pub latitude: Option<RangeInclusive<f64>>,
}

/// One profile returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserHit {
    pub key: String,
    pub fields: Vec<(String, String)>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trip liveness check.
    async fn ping(&self) -> Result<()>;

    /// Write a batch of user records, one hash per record keyed `user:<id>`,
    /// in a single pipelined round trip. Re-writing an id overwrites its
    /// fields, so replaying a batch is safe.
    async fn write_users(&self, batch: &[UserRecord]) -> Result<()>;

    /// Write a batch of score records into their leaderboard sorted sets,
    /// members keyed by user id, in a single pipelined round trip.
    async fn write_scores(&self, batch: &[ScoreRecord]) -> Result<()>;

    /// All fields of a hash; empty when the key does not exist.
    async fn hash_all(&self, key: &str) -> Result<Vec<(String, String)>>;

    /// A single hash field.
    async fn hash_field(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// One page of a cursor scan over keys matching `pattern`. A returned
    /// cursor of zero means the scan is complete.
    async fn scan_keys(&self, cursor: u64, pattern: &str, count: usize)
        -> Result<(u64, Vec<String>)>;

    /// Members of a leaderboard sorted set, highest score first.
    async fn leaderboard_top(&self, leaderboard: &str, n: usize) -> Result<Vec<String>>;

    /// Create the user search index if it does not exist yet. Idempotent.
    async fn ensure_user_index(&self) -> Result<()>;

    /// Search user profiles matching `filter`.
    async fn search_users(&self, filter: &UserFilter) -> Result<Vec<UserHit>>;
}
