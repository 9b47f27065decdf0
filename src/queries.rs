//! The canned lookup and aggregation operations. Each one is a thin
//! composition of store primitives; anything heavier belongs in the store.

use anyhow::Result;
use serde::Serialize;

use crate::store::{Store, UserFilter, UserHit};

/// Keys fetched per scan page in [`even_id_last_names`].
pub const SCAN_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coordinates {
    pub longitude: Option<String>,
    pub latitude: Option<String>,
}

/// All stored fields of one user profile; empty if the user is unknown.
pub async fn user_profile<S: Store + ?Sized>(
    store: &S,
    id: &str,
) -> Result<Vec<(String, String)>> {
    store.hash_all(&format!("user:{}", id)).await
}

/// The longitude/latitude projection of one user profile.
pub async fn user_coordinates<S: Store + ?Sized>(store: &S, id: &str) -> Result<Coordinates> {
    let key = format!("user:{}", id);
    Ok(Coordinates {
        longitude: store.hash_field(&key, "longitude").await?,
        latitude: store.hash_field(&key, "latitude").await?,
    })
}

/// Keys and last names of users whose numeric id starts with an even digit.
/// Runs the cursor scan to completion, one page at a time.
pub async fn even_id_last_names<S: Store + ?Sized>(store: &S) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    let mut cursor = 0;
    loop {
        let (next, keys) = store.scan_keys(cursor, "user:*", SCAN_PAGE_SIZE).await?;
        for key in keys {
            let Some(id) = key.strip_prefix("user:") else {
                continue;
            };
            if !starts_with_even_digit(id) {
                continue;
            }
            let last_name = store.hash_field(&key, "last_name").await?.unwrap_or_default();
            out.push((key, last_name));
        }
        if next == 0 {
            break;
        }
        cursor = next;
    }
    Ok(out)
}

fn starts_with_even_digit(id: &str) -> bool {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    (id.as_bytes()[0] - b'0') % 2 == 0
}

/// Profiles matching `filter`, building the search index on first use.
pub async fn search_profiles<S: Store + ?Sized>(
    store: &S,
    filter: &UserFilter,
) -> Result<Vec<UserHit>> {
    store.ensure_user_index().await?;
    store.search_users(filter).await
}

/// Emails of the top `n` players of a leaderboard, highest score first.
/// Players without a stored email are left out.
pub async fn top_player_emails<S: Store + ?Sized>(
    store: &S,
    leaderboard: &str,
    n: usize,
) -> Result<Vec<String>> {
    let members = store.leaderboard_top(leaderboard, n).await?;
    let mut emails = Vec::with_capacity(members.len());
    for id in members {
        if let Some(email) = store.hash_field(&format!("user:{}", id), "email").await? {
            if !email.is_empty() {
                emails.push(email);
            }
        }
    }
    Ok(emails)
}
