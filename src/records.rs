use serde::{Deserialize, Serialize};

/// One user profile as stored in the service: a hash keyed `user:<id>`.
///
/// Every field is a string and always present; fields missing from the source
/// file come through as empty strings so the stored schema is the same for
/// every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: String,
    pub ip_address: String,
    pub country: String,
    pub country_code: String,
    pub city: String,
    pub longitude: String,
    pub latitude: String,
    pub last_login: String,
}

impl UserRecord {
    pub fn key(&self) -> String {
        format!("user:{}", self.id)
    }

    /// Field/value pairs in hash-write order. The id lives in the key, not
    /// in the hash body.
    pub fn field_pairs(&self) -> [(&'static str, &str); 11] {
        [
            ("first_name", self.first_name.as_str()),
            ("last_name", self.last_name.as_str()),
            ("email", self.email.as_str()),
            ("gender", self.gender.as_str()),
            ("ip_address", self.ip_address.as_str()),
            ("country", self.country.as_str()),
            ("country_code", self.country_code.as_str()),
            ("city", self.city.as_str()),
            ("longitude", self.longitude.as_str()),
            ("latitude", self.latitude.as_str()),
            ("last_login", self.last_login.as_str()),
        ]
    }
}

/// One leaderboard entry: member `user_id` with `score` in the sorted set
/// keyed `leaderboard:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub user_id: String,
    pub leaderboard: String,
    pub score: i64,
}

impl ScoreRecord {
    pub fn key(&self) -> String {
        format!("leaderboard:{}", self.leaderboard)
    }
}
