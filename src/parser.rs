//! Flat-file ingestion.
//!
//! The user file is a sequence of quote-delimited tokens with no reliable
//! line structure: records start at a literal `user:` marker and tokens are
//! separated by a quote-space-quote sequence, alternating between label
//! fragments and values. Chunking on the marker makes the parse insensitive
//! to line breaks inside a record. The score file is ordinary CSV with the
//! header `user:id,score,leaderboard`.
//!
//! Both parsers are pure transforms: text in, a finite sequence of
//! `Result<record, ParseError>` out. Malformed entries are yielded as errors
//! so the caller can skip and count them without aborting the file.

use std::fmt::{Display, Formatter};
use std::io::Read;

use serde::Deserialize;

use crate::records::{ScoreRecord, UserRecord};

/// Value slots required through `latitude` for a chunk to be accepted.
pub const MIN_VALUE_TOKENS: usize = 11;

const USER_MARKER: &str = "user:";
const TOKEN_DELIMITER: &str = "\" \"";

/// Token slot each field is read from. Odd slots hold label fragments and
/// are discarded; this mapping is a compatibility contract with existing
/// data and must not change.
const SLOT_FIRST_NAME: usize = 2;
const SLOT_LAST_NAME: usize = 4;
const SLOT_EMAIL: usize = 6;
const SLOT_GENDER: usize = 8;
const SLOT_IP_ADDRESS: usize = 10;
const SLOT_COUNTRY: usize = 12;
const SLOT_COUNTRY_CODE: usize = 14;
const SLOT_CITY: usize = 16;
const SLOT_LONGITUDE: usize = 18;
const SLOT_LATITUDE: usize = 20;
const SLOT_LAST_LOGIN: usize = 22;

/// A recoverable per-entry failure. Fatal conditions (an unreadable file)
/// are not represented here; they abort the whole operation upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A user chunk that cannot yield a record; `offset` is the byte offset
    /// of the chunk's `user:` marker in the source text.
    ChunkMalformed { offset: usize, reason: String },
    /// A score row that cannot yield a record; `line` is 1-based.
    ScoreUnparseable { line: u64, reason: String },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::ChunkMalformed { offset, reason } => {
                write!(f, "malformed chunk at byte {}: {}", offset, reason)
            }
            ParseError::ScoreUnparseable { line, reason } => {
                write!(f, "unparseable score row at line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Parses the full text of a user file into a lazy record sequence.
///
/// Text before the first `user:` marker is ignored. Each chunk either yields
/// a record or a [`ParseError::ChunkMalformed`]; the sequence always runs to
/// the end of the input.
pub fn user_records(text: &str) -> impl Iterator<Item = Result<UserRecord, ParseError>> + '_ {
    chunks(text).map(|(offset, chunk)| parse_chunk(offset, chunk))
}

/// Splits the raw text into per-user chunks at every `user:` marker.
fn chunks(text: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    let mut starts = text.match_indices(USER_MARKER).map(|(i, _)| i).peekable();
    std::iter::from_fn(move || {
        let start = starts.next()?;
        let end = starts.peek().copied().unwrap_or(text.len());
        Some((start, &text[start..end]))
    })
}

fn parse_chunk(offset: usize, chunk: &str) -> Result<UserRecord, ParseError> {
    let tokens: Vec<&str> = chunk
        .split(TOKEN_DELIMITER)
        .map(|token| token.trim_matches(|c: char| c == '"' || c.is_whitespace()))
        .collect();

    // Value slots are the even indices 0, 2, .. 20; `latitude` at slot 20 is
    // the last mandatory one.
    let value_tokens = tokens.len().div_ceil(2);
    if value_tokens < MIN_VALUE_TOKENS {
        return Err(ParseError::ChunkMalformed {
            offset,
            reason: format!(
                "{} of {} required value tokens",
                value_tokens, MIN_VALUE_TOKENS
            ),
        });
    }

    let id = tokens[0]
        .strip_prefix(USER_MARKER)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ParseError::ChunkMalformed {
            offset,
            reason: "missing user id".to_string(),
        })?;

    let value = |slot: usize| tokens.get(slot).copied().unwrap_or("").to_string();

    Ok(UserRecord {
        id: id.to_string(),
        first_name: value(SLOT_FIRST_NAME),
        last_name: value(SLOT_LAST_NAME),
        email: value(SLOT_EMAIL),
        gender: value(SLOT_GENDER),
        ip_address: value(SLOT_IP_ADDRESS),
        country: value(SLOT_COUNTRY),
        country_code: value(SLOT_COUNTRY_CODE),
        city: value(SLOT_CITY),
        longitude: value(SLOT_LONGITUDE),
        latitude: value(SLOT_LATITUDE),
        last_login: value(SLOT_LAST_LOGIN),
    })
}

#[derive(Debug, Deserialize)]
struct ScoreRow {
    #[serde(rename = "user:id")]
    user_id: String,
    score: String,
    leaderboard: String,
}

/// Parses CSV score data into a lazy record sequence.
///
/// Rows whose `score` does not coerce to an integer, or that are missing a
/// column, are yielded as [`ParseError::ScoreUnparseable`] and do not stop
/// the sequence.
pub fn score_records<R: Read>(reader: R) -> impl Iterator<Item = Result<ScoreRecord, ParseError>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers().ok().cloned();
    let mut rows = csv_reader.into_records();

    std::iter::from_fn(move || {
        let row = match rows.next()? {
            Ok(row) => row,
            Err(err) => {
                let line = err.position().map(|p| p.line()).unwrap_or(0);
                return Some(Err(ParseError::ScoreUnparseable {
                    line,
                    reason: err.to_string(),
                }));
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        let parsed: ScoreRow = match row.deserialize(headers.as_ref()) {
            Ok(parsed) => parsed,
            Err(err) => {
                return Some(Err(ParseError::ScoreUnparseable {
                    line,
                    reason: err.to_string(),
                }))
            }
        };

        let score = match parsed.score.trim().parse::<i64>() {
            Ok(score) => score,
            Err(_) => {
                return Some(Err(ParseError::ScoreUnparseable {
                    line,
                    reason: format!("score {:?} is not an integer", parsed.score),
                }))
            }
        };

        Some(Ok(ScoreRecord {
            user_id: parsed.user_id,
            leaderboard: parsed.leaderboard,
            score,
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CHUNK: &str = "user:42\" \"n\" \"Ann\" \"l\" \"Lee\" \"e\" \"a@b.com\" \
        \"g\" \"F\" \"ip\" \"1.2.3.4\" \"c\" \"USA\" \"cc\" \"US\" \"ci\" \"NYC\" \
        \"lo\" \"-73.9\" \"la\" \"40.7";

    fn ann() -> UserRecord {
        UserRecord {
            id: "42".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            email: "a@b.com".to_string(),
            gender: "F".to_string(),
            ip_address: "1.2.3.4".to_string(),
            country: "USA".to_string(),
            country_code: "US".to_string(),
            city: "NYC".to_string(),
            longitude: "-73.9".to_string(),
            latitude: "40.7".to_string(),
            last_login: String::new(),
        }
    }

    /// Renders a record back into the canonical quoted format, with label
    /// fragments in the odd slots and a leading quote as in the real files.
    fn render(user: &UserRecord) -> String {
        let mut tokens = vec![format!("user:{}", user.id)];
        for (label, value) in user.field_pairs() {
            if label == "last_login" && value.is_empty() {
                continue;
            }
            tokens.push(label.to_string());
            tokens.push(value.to_string());
        }
        format!("\"{}\"", tokens.join("\" \""))
    }

    #[test]
    fn parses_eleven_value_chunk_with_empty_last_login() {
        let records: Vec<_> = user_records(FULL_CHUNK).collect();
        assert_eq!(records, vec![Ok(ann())]);
    }

    #[test]
    fn parsing_is_deterministic() {
        let first: Vec<_> = user_records(FULL_CHUNK).collect();
        let second: Vec<_> = user_records(FULL_CHUNK).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_chunk_with_ten_value_tokens() {
        // Drop the trailing label/value pair so `latitude` is missing.
        let short = FULL_CHUNK.rsplitn(3, TOKEN_DELIMITER).nth(2).unwrap();
        let records: Vec<_> = user_records(short).collect();
        assert_eq!(
            records,
            vec![Err(ParseError::ChunkMalformed {
                offset: 0,
                reason: "10 of 11 required value tokens".to_string(),
            })]
        );
    }

    #[test]
    fn rejects_chunk_with_empty_id() {
        let chunk = FULL_CHUNK.replacen("user:42", "user:", 1);
        let records: Vec<_> = user_records(&chunk).collect();
        assert_eq!(
            records,
            vec![Err(ParseError::ChunkMalformed {
                offset: 0,
                reason: "missing user id".to_string(),
            })]
        );
    }

    #[test]
    fn last_login_is_kept_when_present() {
        let mut with_login = ann();
        with_login.last_login = "2024-01-01".to_string();
        let text = render(&with_login);
        let records: Vec<_> = user_records(&text).collect();
        assert_eq!(records, vec![Ok(with_login)]);
    }

    #[test]
    fn chunking_does_not_depend_on_line_structure() {
        let mut a = ann();
        a.id = "1".to_string();
        let mut b = ann();
        b.id = "2".to_string();
        let mut c = ann();
        c.id = "3".to_string();
        // Two records on one line, a third after a newline.
        let text = format!("{} {}\n{}", render(&a), render(&b), render(&c));
        let parsed: Vec<_> = user_records(&text).map(Result::unwrap).collect();
        assert_eq!(parsed, vec![a, b, c]);
    }

    #[test]
    fn one_bad_chunk_does_not_poison_the_file() {
        let mut text = String::new();
        for i in 0..9 {
            let mut user = ann();
            user.id = i.to_string();
            text.push_str(&render(&user));
            text.push('\n');
        }
        text.push_str("\"user:99\" \"n\" \"Bob\"\n");

        let results: Vec<_> = user_records(&text).collect();
        let parsed = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results.iter().filter(|r| r.is_err()).count();
        assert_eq!((parsed, rejected), (9, 1));
    }

    #[test]
    fn round_trips_through_the_quoted_format() {
        let mut user = ann();
        user.last_login = "2023-12-24".to_string();
        let records: Vec<_> = user_records(&render(&user)).collect();
        assert_eq!(records, vec![Ok(user)]);
    }

    #[test]
    fn parses_valid_score_rows_exactly() {
        let csv = "user:id,score,leaderboard\n7,150,2\n8,-3,1\n";
        let records: Vec<_> = score_records(csv.as_bytes()).collect();
        assert_eq!(
            records,
            vec![
                Ok(ScoreRecord {
                    user_id: "7".to_string(),
                    leaderboard: "2".to_string(),
                    score: 150,
                }),
                Ok(ScoreRecord {
                    user_id: "8".to_string(),
                    leaderboard: "1".to_string(),
                    score: -3,
                }),
            ]
        );
    }

    #[test]
    fn rejects_non_integer_scores() {
        let csv = "user:id,score,leaderboard\n7,lots,2\n8,200,1\n";
        let records: Vec<_> = score_records(csv.as_bytes()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            Err(ParseError::ScoreUnparseable {
                line: 2,
                reason: "score \"lots\" is not an integer".to_string(),
            })
        );
        assert!(records[1].is_ok());
    }

    #[test]
    fn rejects_rows_missing_a_column() {
        let csv = "user:id,score,leaderboard\n7,150\n";
        let records: Vec<_> = score_records(csv.as_bytes()).collect();
        assert_eq!(records.len(), 1);
        assert!(matches!(
            records[0],
            Err(ParseError::ScoreUnparseable { line: 2, .. })
        ));
    }
}
