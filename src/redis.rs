#![cfg(feature = "redis")]

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::records::{ScoreRecord, UserRecord};
use crate::store::{Store, UserFilter, UserHit};

const USER_INDEX: &str = "user_idx";
const USER_KEY_PREFIX: &str = "user:";

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Client for a hosted Redis-compatible service. The connection is
/// multiplexed and cheap to clone per operation; the handle is acquired once
/// in main and dropped on exit.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let info = redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(settings.host.clone(), settings.port),
            redis: redis::RedisConnectionInfo {
                db: settings.db,
                username: settings.username.clone(),
                password: settings.password.clone(),
                ..Default::default()
            },
        };
        let client = redis::Client::open(info)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .with_context(|| format!("connecting to {}:{}", settings.host, settings.port))?;
        Ok(Self { conn })
    }
}

/// Renders a [`UserFilter`] into the service's search query syntax, e.g.
/// `@gender:female (@country:{China|Russia}) @latitude:[40 46]`.
fn render_query(filter: &UserFilter) -> String {
    let mut parts = Vec::new();
    if let Some(gender) = &filter.gender {
        parts.push(format!("@gender:{}", gender));
    }
    if !filter.countries.is_empty() {
        parts.push(format!("(@country:{{{}}})", filter.countries.join("|")));
    }
    if let Some(range) = &filter.latitude {
        parts.push(format!("@latitude:[{} {}]", range.start(), range.end()));
    }
    if parts.is_empty() {
        "*".to_string()
    } else {
        parts.join(" ")
    }
}

fn as_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        redis::Value::SimpleString(text) => Some(text.clone()),
        _ => None,
    }
}

/// Pulls hits out of a search reply: a leading total count, then alternating
/// document key and field/value array.
fn parse_search_reply(reply: &redis::Value) -> Result<Vec<UserHit>> {
    let redis::Value::Array(items) = reply else {
        bail!("unexpected search reply: {:?}", reply);
    };
    let mut hits = Vec::new();
    let mut items = items.iter();
    let _total = items.next();
    while let Some(item) = items.next() {
        let Some(key) = as_string(item) else {
            bail!("unexpected document key in search reply: {:?}", item);
        };
        let fields = match items.next() {
            Some(redis::Value::Array(pairs)) => pairs
                .chunks(2)
                .filter_map(|pair| match pair {
                    [field, value] => Some((as_string(field)?, as_string(value)?)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        hits.push(UserHit { key, fields });
    }
    Ok(hits)
}

#[async_trait]
impl Store for RedisStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn write_users(&self, batch: &[UserRecord]) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for user in batch {
            pipe.hset_multiple(user.key(), &user.field_pairs()).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn write_scores(&self, batch: &[ScoreRecord]) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for score in batch {
            pipe.zadd(score.key(), &score.user_id, score.score).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn hash_all(&self, key: &str) -> Result<Vec<(String, String)>> {
        let mut conn = self.conn.clone();
        let fields: Vec<(String, String)> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn hash_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn scan_keys(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>)> {
        let mut conn = self.conn.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok((next, keys))
    }

    async fn leaderboard_top(&self, leaderboard: &str, n: usize) -> Result<Vec<String>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let key = format!("leaderboard:{}", leaderboard);
        let members: Vec<String> = conn.zrevrange(key, 0, n as isize - 1).await?;
        Ok(members)
    }

    async fn ensure_user_index(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let existing: redis::RedisResult<redis::Value> = redis::cmd("FT.INFO")
            .arg(USER_INDEX)
            .query_async(&mut conn)
            .await;
        if existing.is_ok() {
            return Ok(());
        }

        let _: () = redis::cmd("FT.CREATE")
            .arg(USER_INDEX)
            .arg("ON")
            .arg("HASH")
            .arg("PREFIX")
            .arg(1)
            .arg(USER_KEY_PREFIX)
            .arg("SCHEMA")
            .arg("gender")
            .arg("TEXT")
            .arg("country")
            .arg("TAG")
            .arg("latitude")
            .arg("NUMERIC")
            .arg("first_name")
            .arg("TEXT")
            .query_async(&mut conn)
            .await
            .context("creating user search index")?;
        Ok(())
    }

    async fn search_users(&self, filter: &UserFilter) -> Result<Vec<UserHit>> {
        let mut conn = self.conn.clone();
        let reply: redis::Value = redis::cmd("FT.SEARCH")
            .arg(USER_INDEX)
            .arg(render_query(filter))
            .query_async(&mut conn)
            .await?;
        parse_search_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_the_full_filter() {
        let filter = UserFilter {
            gender: Some("female".to_string()),
            countries: vec!["China".to_string(), "Russia".to_string()],
            latitude: Some(40.0..=46.0),
        };
        assert_eq!(
            render_query(&filter),
            "@gender:female (@country:{China|Russia}) @latitude:[40 46]"
        );
    }

    #[test]
    fn renders_an_empty_filter_as_match_all() {
        assert_eq!(render_query(&UserFilter::default()), "*");
    }

    #[test]
    fn parses_a_search_reply_into_hits() {
        let reply = redis::Value::Array(vec![
            redis::Value::Int(1),
            redis::Value::BulkString(b"user:1".to_vec()),
            redis::Value::Array(vec![
                redis::Value::BulkString(b"gender".to_vec()),
                redis::Value::BulkString(b"female".to_vec()),
                redis::Value::BulkString(b"country".to_vec()),
                redis::Value::BulkString(b"China".to_vec()),
            ]),
        ]);
        let hits = parse_search_reply(&reply).unwrap();
        assert_eq!(
            hits,
            vec![UserHit {
                key: "user:1".to_string(),
                fields: vec![
                    ("gender".to_string(), "female".to_string()),
                    ("country".to_string(), "China".to_string()),
                ],
            }]
        );
    }
}
